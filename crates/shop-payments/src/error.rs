//! Payment Error Types

use shop_core::ShopError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Checkout request is unusable
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    /// Session id is malformed or unknown to the provider
    #[error("Checkout session not found: {0}")]
    SessionNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Order completion failed
    #[error(transparent)]
    Shop(#[from] ShopError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Stripe(_) => true,
            PaymentError::Shop(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Stripe(_) => "Payment processing failed. Please try again.",
            PaymentError::InvalidRequest(_) => "The checkout request is invalid.",
            PaymentError::SessionNotFound(_) => "Checkout session not found.",
            PaymentError::Config(_) => "Service configuration error.",
            PaymentError::Shop(e) => e.user_message(),
            _ => "An error occurred processing your request.",
        }
    }
}
