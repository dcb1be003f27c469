//! # shop-payments
//!
//! Hosted checkout sessions and webhook processing for the storefront.
//!
//! **Flow:** Cart page → Redirect to Stripe's hosted page → Redirect back,
//! with Stripe calling the webhook independently.
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │    Cart     │────▶│  Stripe Hosted  │────▶│ purchase-success │──┐
//! │  (checkout) │     │  Checkout Page  │     │  (confirmation)  │  │
//! └─────────────┘     └────────┬────────┘     └──────────────────┘  │
//!                              │ checkout.session.completed          ▼
//!                              └──────────────▶ webhook ─▶ OrderCompleter
//! ```
//!
//! Both the confirmation call and the webhook end in
//! [`shop_core::OrderCompleter::on_payment_completed`], which records at most
//! one order per session.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shop_payments::{StripeClient, CheckoutRequest, PaymentProvider};
//!
//! let client = StripeClient::new("sk_test_xxx", "whsec_xxx", "usd")?;
//! let session = client.create_checkout_session(request).await?;
//!
//! // Redirect user to: session.checkout_url
//! ```

mod checkout;
mod error;
mod mock;
mod provider;
mod webhook;

pub use checkout::{
    payment_session_from_stripe, to_minor_units, CheckoutLineItem, CheckoutRequest,
    CheckoutSession, StripeClient,
};
pub use error::{PaymentError, Result};
pub use mock::MockPaymentProvider;
pub use provider::PaymentProvider;
pub use webhook::{WebhookEvent, WebhookHandler};
