//! Storefront checkout server
//!
//! Axum-based server for hosted checkout, payment confirmation, Stripe
//! webhooks and admin order listing.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop_core::mongo::MongoStores;
use shop_core::{
    CatalogStore, CouponPolicy, CouponStore, MemoryCatalog, MemoryCouponStore, MemoryOrderStore,
    OrderCompleter, OrderStore, StockMutator,
};
use shop_payments::{PaymentProvider, StripeClient};

use crate::config::ServerConfig;
use crate::handlers::{
    all_orders, checkout_success, completed_orders, create_checkout_session, health_check,
    stripe_webhook,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let state = build_state(config).await?;
    let addr = state.config.bind_addr.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 shop-server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                               - Health check");
    tracing::info!("  POST /api/payments/create-checkout-session - Create checkout");
    tracing::info!("  POST /api/payments/checkout-success        - Confirm payment");
    tracing::info!("  POST /api/payments/webhook                 - Stripe webhook");
    tracing::info!("  GET  /api/orders/completed                 - Completed orders");
    tracing::info!("  GET  /api/orders/all                       - All orders");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Wire stores, payment provider and order completion from configuration
async fn build_state(config: ServerConfig) -> anyhow::Result<AppState> {
    let catalog: Arc<dyn CatalogStore>;
    let stock: Arc<dyn StockMutator>;
    let orders: Arc<dyn OrderStore>;
    let coupons: Arc<dyn CouponStore>;

    let store_backend = match config.database_url.as_deref() {
        Some(url) => {
            let stores = MongoStores::connect(url, &config.database_name).await?;
            tracing::info!(database = %config.database_name, "✓ Connected to MongoDB");
            catalog = Arc::new(stores.catalog.clone());
            stock = Arc::new(stores.catalog);
            orders = Arc::new(stores.orders);
            coupons = Arc::new(stores.coupons);
            "mongo"
        }
        None => {
            tracing::warn!("⚠ DATABASE_URL not set - using in-memory stores");
            let memory = Arc::new(MemoryCatalog::new());
            catalog = memory.clone();
            stock = memory;
            orders = Arc::new(MemoryOrderStore::new());
            coupons = Arc::new(MemoryCouponStore::new());
            "memory"
        }
    };

    let (provider, webhook_secret): (Option<Arc<dyn PaymentProvider>>, Option<String>) =
        match config.stripe.as_ref() {
            Some(stripe) => {
                let client =
                    StripeClient::new(&stripe.secret_key, &stripe.webhook_secret, &config.currency)?;
                tracing::info!(currency = %config.currency, "✓ Stripe configured");
                let secret = client.webhook_secret().to_string();
                let provider: Arc<dyn PaymentProvider> = Arc::new(client);
                (Some(provider), Some(secret))
            }
            None => {
                tracing::warn!("⚠ Stripe not configured - payments disabled");
                tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
                (None, None)
            }
        };

    let completer = OrderCompleter::new(
        catalog.clone(),
        stock,
        orders.clone(),
        coupons.clone(),
        CouponPolicy::default(),
    );

    Ok(AppState {
        config: Arc::new(config),
        catalog,
        orders,
        coupons,
        completer: Arc::new(completer),
        provider,
        webhook_secret,
        store_backend,
    })
}

/// Build the router over shared state
pub fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Payments
        .route(
            "/api/payments/create-checkout-session",
            post(create_checkout_session),
        )
        .route("/api/payments/checkout-success", post(checkout_success))
        .route("/api/payments/webhook", post(stripe_webhook))
        // Admin orders
        .route("/api/orders/completed", get(completed_orders))
        .route("/api/orders/all", get(all_orders))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
