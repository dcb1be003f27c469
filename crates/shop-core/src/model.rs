//! Domain Models
//!
//! Catalog products, orders and coupons as they are persisted.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Catalog ids arrive as plain strings or as document-store object ids
/// (`{"$oid": "..."}`); both become the hex string.
fn deserialize_product_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Plain(String),
        ObjectId {
            #[serde(rename = "$oid")]
            oid: String,
        },
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Plain(id) | RawId::ObjectId { oid: id } => id,
    })
}

/// A catalog product (read-only here, except for `stock`)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier
    #[serde(rename = "_id", deserialize_with = "deserialize_product_id")]
    pub id: String,

    /// Display name
    pub name: String,

    /// Unit price in major currency units
    pub price: Decimal,

    /// Units on hand
    #[serde(default)]
    pub stock: i64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
        }
    }
}

/// Unique order identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        }
    }
}

/// One purchased product within an order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Catalog id when the product was found, otherwise the raw cart id
    pub product: String,

    pub quantity: u32,

    /// Unit price charged, in major currency units
    pub price: Decimal,
}

/// A persisted order, created once per payment session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,

    /// Purchasing user, when the session carried one
    pub user: Option<String>,

    pub products: Vec<OrderLine>,

    /// Provider-confirmed amount in major units (not the sum of `products`)
    pub total_amount: Decimal,

    /// Payment session this order was created from (unique)
    pub payment_session_id: String,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a completed order for a payment session
    pub fn completed(
        payment_session_id: impl Into<String>,
        user: Option<String>,
        products: Vec<OrderLine>,
        total_amount: Decimal,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user,
            products,
            total_amount,
            payment_session_id: payment_session_id.into(),
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

/// A percentage discount owned by a single user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,

    /// 0-100
    pub discount_percentage: u8,

    pub is_active: bool,

    pub user_id: String,

    pub expiration_date: DateTime<Utc>,
}

impl Coupon {
    /// Create an active coupon expiring `valid_for` from now
    pub fn new(
        code: impl Into<String>,
        user_id: impl Into<String>,
        discount_percentage: u8,
        valid_for: Duration,
    ) -> Self {
        Self {
            code: code.into(),
            discount_percentage: discount_percentage.min(100),
            is_active: true,
            user_id: user_id.into(),
            expiration_date: Utc::now() + valid_for,
        }
    }

    /// Check if coupon is usable (active and not expired)
    pub fn is_valid(&self) -> bool {
        self.is_active && Utc::now() < self.expiration_date
    }

    /// Discount this coupon takes off `amount_minor`, rounded half away from
    /// zero. `None` if the amount is too large to discount in `i64`.
    pub fn discount_for(&self, amount_minor: i64) -> Option<i64> {
        amount_minor
            .checked_mul(i64::from(self.discount_percentage))?
            .checked_add(50)
            .map(|discount| discount.div_euclid(100))
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_serializes_like_a_document() {
        let order = Order::completed(
            "cs_test_1",
            Some("user_1".into()),
            vec![OrderLine {
                product: "p1".into(),
                quantity: 2,
                price: dec!(9.99),
            }],
            dec!(19.98),
        );

        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("_id").is_some());
        assert_eq!(json["paymentSessionId"], "cs_test_1");
        assert_eq!(json["status"], "completed");
        assert!(json.get("totalAmount").is_some());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_product_id_accepts_string_and_object_id() {
        let plain: Product =
            serde_json::from_str(r#"{"_id":"p1","name":"Jeans","price":"49.99","stock":3}"#).unwrap();
        assert_eq!(plain.id, "p1");

        let oid: Product = serde_json::from_str(
            r#"{"_id":{"$oid":"65a1f0c2e4b0a1b2c3d4e5f6"},"name":"Hat","price":"15.50"}"#,
        )
        .unwrap();
        assert_eq!(oid.id, "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(oid.stock, 0);
    }

    #[test]
    fn test_coupon_validity() {
        let mut coupon = Coupon::new("GIFT1234", "user_1", 10, Duration::days(30));
        assert!(coupon.is_valid());

        coupon.deactivate();
        assert!(!coupon.is_valid());

        let expired = Coupon::new("GIFT5678", "user_1", 10, Duration::days(-1));
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_coupon_discount_rounding() {
        let coupon = Coupon::new("GIFT1234", "user_1", 10, Duration::days(30));
        assert_eq!(coupon.discount_for(20000), Some(2000));
        assert_eq!(coupon.discount_for(1995), Some(200));
        assert_eq!(coupon.discount_for(1994), Some(199));
    }

    #[test]
    fn test_coupon_discount_overflow() {
        let coupon = Coupon::new("GIFT1234", "user_1", 10, Duration::days(30));
        assert_eq!(coupon.discount_for(i64::MAX / 5), None);
        // largest amounts that still fit after scaling by the percentage
        assert_eq!(coupon.discount_for(922_337_203_685_477_575), Some(92_233_720_368_547_758));
    }
}
