//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use shop_core::{Order, OrderStatus, ShopError};
use shop_payments::{CheckoutLineItem, CheckoutRequest, PaymentError, PaymentProvider, WebhookHandler};

use crate::state::AppState;

/// Header carrying the authenticated user id, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payments_configured: bool,
    pub store_backend: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn payments_disabled() -> ApiError {
    error(
        StatusCode::SERVICE_UNAVAILABLE,
        "Payments not configured",
        "PAYMENTS_DISABLED",
    )
}

fn storage_error(e: &ShopError) -> ApiError {
    tracing::error!(error = %e, "Store error");
    error(StatusCode::INTERNAL_SERVER_ERROR, e.user_message(), "STORE_ERROR")
}

fn payment_error(e: &PaymentError, code: &str) -> ApiError {
    let status = match e {
        PaymentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PaymentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, retryable = e.is_retryable(), code, "Payment error");
    } else {
        tracing::warn!(error = %e, code, "Rejected payment request");
    }
    error(status, e.user_message(), code)
}

fn user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn default_quantity() -> u32 {
    1
}

/// Product as sent by the storefront cart
#[derive(Debug, Deserialize)]
pub struct CartProduct {
    #[serde(rename = "_id", alias = "productId")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub products: Vec<CartProduct>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub id: String,
    pub url: String,
    /// Amount to be charged, in major units
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessBody {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutSuccessQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessResponse {
    pub success: bool,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Serialize)]
pub struct ProductRef {
    #[serde(rename = "_id")]
    pub id: String,
    /// None when the product no longer exists in the catalog
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineView {
    pub product: ProductRef,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: Option<String>,
    pub products: Vec<OrderLineView>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub payment_session_id: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub ok: bool,
    pub orders: Vec<OrderView>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments_configured: state.provider.is_some(),
        store_backend: state.store_backend,
    })
}

/// Create a hosted checkout session for the cart
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    let provider = state.provider.as_ref().ok_or_else(payments_disabled)?;

    if payload.products.is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Invalid or empty products array",
            "INVALID_PRODUCTS",
        ));
    }

    let user_id = user_id(&headers);

    // Unknown or foreign codes are ignored, the checkout proceeds at full price
    let coupon = match (payload.coupon_code.as_deref().map(str::trim), &user_id) {
        (Some(code), Some(user)) if !code.is_empty() => state
            .coupons
            .find_active(code, user)
            .await
            .map_err(|e| storage_error(&e))?,
        _ => None,
    };

    if let (Some(code), None) = (&payload.coupon_code, &coupon) {
        tracing::debug!(coupon = %code, user_id = ?user_id, "Coupon not applicable");
    }

    let request = CheckoutRequest {
        items: payload
            .products
            .into_iter()
            .map(|p| CheckoutLineItem {
                product_id: p.id,
                name: p.name,
                image: p.image,
                unit_price: p.price,
                quantity: p.quantity.max(1),
            })
            .collect(),
        user_id,
        coupon,
        success_url: state.config.success_url(),
        cancel_url: state.config.cancel_url(),
    };

    let session = provider
        .create_checkout_session(request)
        .await
        .map_err(|e| payment_error(&e, "CHECKOUT_ERROR"))?;

    Ok(Json(CreateCheckoutResponse {
        id: session.id,
        url: session.checkout_url,
        total_amount: Decimal::new(session.amount_total, 2),
    }))
}

/// Confirmation call from the purchase-success page
pub async fn checkout_success(
    State(state): State<AppState>,
    Query(query): Query<CheckoutSuccessQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    // Body is optional; an unparsable body is treated like an empty one
    let body: CheckoutSuccessBody = serde_json::from_slice(&body).unwrap_or_default();

    let session_id = body
        .session_id
        .or(query.session_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    let Some(session_id) = session_id else {
        let missing = serde_json::json!({ "ok": false, "message": "Missing session id" });
        return Ok((StatusCode::BAD_REQUEST, Json(missing)).into_response());
    };

    let provider = state.provider.as_ref().ok_or_else(payments_disabled)?;

    let session = provider
        .retrieve_session(&session_id)
        .await
        .map_err(|e| payment_error(&e, "SESSION_ERROR"))?;

    let outcome = state
        .completer
        .on_payment_completed(&session)
        .await
        .map_err(|e| storage_error(&e))?;

    tracing::info!(
        session_id = %session_id,
        outcome = outcome.as_str(),
        "Checkout confirmation processed"
    );

    Ok(Json(CheckoutSuccessResponse {
        success: true,
        outcome: outcome.as_str().to_string(),
        order_id: outcome.order_id().map(|id| id.as_str().to_string()),
    })
    .into_response())
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, ApiError> {
    let secret = state.webhook_secret.as_deref().ok_or_else(payments_disabled)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            error(
                StatusCode::BAD_REQUEST,
                "Missing Stripe signature",
                "MISSING_SIGNATURE",
            )
        })?;

    let event = WebhookHandler::parse_event(&body, signature, secret).map_err(|e| {
        tracing::warn!("Webhook signature failed: {}", e);
        error(StatusCode::BAD_REQUEST, "Invalid signature", "INVALID_SIGNATURE")
    })?;

    // Non-2xx makes Stripe redeliver
    state.webhook_handler().handle(event).await.map_err(|e| {
        tracing::error!(error = %e, retryable = e.is_retryable(), "Webhook processing error");
        error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook processing failed",
            "WEBHOOK_ERROR",
        )
    })?;

    Ok(Json(WebhookAck { received: true }))
}

/// Completed orders, newest first
pub async fn completed_orders(State(state): State<AppState>) -> Result<Json<OrdersResponse>, ApiError> {
    list_orders(&state, Some(OrderStatus::Completed)).await
}

/// All orders, newest first
pub async fn all_orders(State(state): State<AppState>) -> Result<Json<OrdersResponse>, ApiError> {
    list_orders(&state, None).await
}

async fn list_orders(
    state: &AppState,
    status: Option<OrderStatus>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let orders = state
        .orders
        .list_recent(status)
        .await
        .map_err(|e| storage_error(&e))?;

    let ids: Vec<String> = orders
        .iter()
        .flat_map(|order| order.products.iter().map(|line| line.product.clone()))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let names: HashMap<String, String> = if ids.is_empty() {
        HashMap::new()
    } else {
        state
            .catalog
            .find_by_ids(&ids)
            .await
            .map_err(|e| storage_error(&e))?
            .into_iter()
            .map(|product| (product.id, product.name))
            .collect()
    };

    let orders = orders
        .into_iter()
        .map(|order| order_view(order, &names))
        .collect();

    Ok(Json(OrdersResponse { ok: true, orders }))
}

fn order_view(order: Order, names: &HashMap<String, String>) -> OrderView {
    OrderView {
        id: order.id.as_str().to_string(),
        user: order.user,
        products: order
            .products
            .into_iter()
            .map(|line| OrderLineView {
                product: ProductRef {
                    name: names.get(&line.product).cloned(),
                    id: line.product,
                },
                quantity: line.quantity,
                price: line.price,
            })
            .collect(),
        total_amount: order.total_amount,
        payment_session_id: order.payment_session_id,
        status: order.status,
        created_at: order.created_at,
    }
}
