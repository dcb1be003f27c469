//! Application State

use std::sync::Arc;

use shop_core::{CatalogStore, CouponStore, OrderCompleter, OrderStore};
use shop_payments::{PaymentProvider, WebhookHandler};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Product lookups for order listing
    pub catalog: Arc<dyn CatalogStore>,

    pub orders: Arc<dyn OrderStore>,

    /// Coupon validation at checkout time
    pub coupons: Arc<dyn CouponStore>,

    pub completer: Arc<OrderCompleter>,

    /// Payment provider (optional - None if not configured)
    pub provider: Option<Arc<dyn PaymentProvider>>,

    /// Webhook signing secret, present whenever Stripe is configured
    pub webhook_secret: Option<String>,

    /// "mongo" or "memory", reported by /health
    pub store_backend: &'static str,
}

impl AppState {
    pub fn webhook_handler(&self) -> WebhookHandler {
        WebhookHandler::new(self.completer.clone())
    }
}
