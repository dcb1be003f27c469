//! Error Types

use thiserror::Error;

/// Result type alias for shop operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Shop error types
#[derive(Error, Debug)]
pub enum ShopError {
    /// Persistence layer unreachable or rejected a write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Every generated coupon code collided with an existing one
    #[error("Could not generate a unique coupon code after {0} attempts")]
    CouponCodeExhausted(usize),
}

impl ShopError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ShopError::Storage(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            ShopError::Storage(_) => "We could not save your order. Please try again.",
            ShopError::CouponCodeExhausted(_) => "An error occurred processing your request.",
        }
    }
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for ShopError {
    fn from(err: mongodb::error::Error) -> Self {
        ShopError::Storage(err.to_string())
    }
}
