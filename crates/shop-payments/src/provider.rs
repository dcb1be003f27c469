//! Payment Provider Abstraction

use async_trait::async_trait;

use shop_core::PaymentSession;

use crate::checkout::{CheckoutRequest, CheckoutSession};
use crate::error::Result;

/// Payment provider trait (Strategy pattern)
///
/// Stripe in production, [`crate::MockPaymentProvider`] in tests.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session for the request
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession>;

    /// Fetch the provider's current view of a session
    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession>;
}
