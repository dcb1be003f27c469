//! Stripe Checkout Integration
//!
//! Implements the "Stripe Checkout (Hosted)" approach: the cart becomes
//! one-off line items, and the compact cart encoding plus user and coupon
//! travel in the session metadata for order creation later.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client,
    Coupon as StripeCoupon, CouponDuration, CreateCheckoutSession, CreateCheckoutSessionDiscounts,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCheckoutSessionPaymentMethodTypes,
    CreateCoupon, Currency,
};

use shop_core::{encode_cart, CartItem, Coupon, PaymentSession, PaymentStatus, SessionMetadata};

use crate::error::{PaymentError, Result};
use crate::provider::PaymentProvider;

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
    currency: Currency,
}

impl StripeClient {
    /// Create a new Stripe client charging in `currency` (ISO code, e.g. "usd")
    pub fn new(secret_key: &str, webhook_secret: &str, currency: &str) -> Result<Self> {
        let currency = Currency::from_str(&currency.to_lowercase())
            .map_err(|_| PaymentError::Config(format!("Unsupported currency: {currency}")))?;

        Ok(Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
            currency,
        })
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Create a single-use percentage coupon on Stripe's side
    async fn create_discount(&self, percent_off: u8) -> Result<String> {
        let mut params = CreateCoupon::new();
        params.percent_off = Some(f64::from(percent_off));
        params.duration = Some(CouponDuration::Once);

        let coupon = StripeCoupon::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(coupon.id.to_string())
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        request.validate()?;

        let metadata = request.metadata();
        let amount_total = request.total_minor()?;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.metadata = Some(metadata.to_map());

        let mut line_items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            line_items.push(CreateCheckoutSessionLineItems {
                quantity: Some(u64::from(item.quantity)),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: self.currency,
                    unit_amount: Some(item.unit_amount_minor()?),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: item.name.clone(),
                        images: item.image.clone().map(|image| vec![image]),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        params.line_items = Some(line_items);

        if let Some(ref coupon) = request.coupon {
            let coupon_id = self.create_discount(coupon.discount_percentage).await?;
            params.discounts = Some(vec![CreateCheckoutSessionDiscounts {
                coupon: Some(coupon_id),
                ..Default::default()
            }]);
        }

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        tracing::info!(
            session_id = %session.id,
            items = request.items.len(),
            amount_total,
            coupon = ?metadata.coupon_code,
            "Created Stripe checkout session"
        );

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
            amount_total,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession> {
        let id = CheckoutSessionId::from_str(session_id)
            .map_err(|e| PaymentError::SessionNotFound(format!("{session_id}: {e}")))?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &["payment_intent"])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(payment_session_from_stripe(&session))
    }

}

/// Provider-neutral view of a Stripe checkout session
pub fn payment_session_from_stripe(session: &StripeCheckoutSession) -> PaymentSession {
    PaymentSession {
        id: session.id.to_string(),
        payment_status: PaymentStatus::from_str(session.payment_status.as_str()),
        amount_total: session.amount_total.unwrap_or(0),
        metadata: session
            .metadata
            .as_ref()
            .map(SessionMetadata::from_map)
            .unwrap_or_default(),
    }
}

/// Convert a major-unit price to minor units, rounding half away from zero
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|minor| minor.to_i64())
        .ok_or_else(amount_out_of_range)
}

fn amount_out_of_range() -> PaymentError {
    PaymentError::InvalidRequest("Amount out of range".into())
}

/// One product in a checkout request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    /// Catalog id
    pub product_id: String,

    /// Display name on the hosted page
    pub name: String,

    #[serde(default)]
    pub image: Option<String>,

    /// Unit price in major currency units
    pub unit_price: Decimal,

    pub quantity: u32,
}

impl CheckoutLineItem {
    pub fn unit_amount_minor(&self) -> Result<i64> {
        to_minor_units(self.unit_price)
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Products being purchased, in cart order
    pub items: Vec<CheckoutLineItem>,

    /// Purchasing user, if known
    #[serde(default)]
    pub user_id: Option<String>,

    /// Coupon to apply; must already be validated for `user_id`
    #[serde(default)]
    pub coupon: Option<Coupon>,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,
}

impl CheckoutRequest {
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(PaymentError::InvalidRequest("Invalid or empty products array".into()));
        }
        if let Some(item) = self.items.iter().find(|item| item.unit_price < Decimal::ZERO) {
            return Err(PaymentError::InvalidRequest(format!(
                "Negative price for product {}",
                item.product_id
            )));
        }
        Ok(())
    }

    /// Cart total before discounts, in minor units
    pub fn subtotal_minor(&self) -> Result<i64> {
        self.items.iter().try_fold(0_i64, |total, item| {
            item.unit_amount_minor()?
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| total.checked_add(line))
                .ok_or_else(amount_out_of_range)
        })
    }

    /// Cart total after the coupon discount, in minor units
    pub fn total_minor(&self) -> Result<i64> {
        let subtotal = self.subtotal_minor()?;
        let discount = match &self.coupon {
            Some(coupon) => coupon
                .discount_for(subtotal)
                .ok_or_else(amount_out_of_range)?,
            None => 0,
        };
        Ok(subtotal - discount)
    }

    /// Session metadata carrying the encoded cart
    pub fn metadata(&self) -> SessionMetadata {
        let cart: Vec<CartItem> = self
            .items
            .iter()
            .map(|item| CartItem::new(item.product_id.clone(), item.quantity))
            .collect();

        SessionMetadata {
            user_id: self.user_id.clone(),
            cart: encode_cart(&cart),
            coupon_code: self.coupon.as_ref().map(|c| c.code.clone()),
        }
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,

    /// Amount the customer will be charged, in minor units
    pub amount_total: i64,
}
