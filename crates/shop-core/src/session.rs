//! Payment Sessions
//!
//! Provider-neutral view of a checkout session as reported by the payment
//! provider. Only this projection ever reaches order completion.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key holding the purchasing user id
pub const META_USER_ID: &str = "userId";

/// Metadata key holding the encoded cart
pub const META_CART: &str = "cart";

/// Metadata key holding the redeemed coupon code
pub const META_COUPON_CODE: &str = "couponCode";

/// Payment status of a checkout session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::NoPaymentRequired => "no_payment_required",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "no_payment_required" => PaymentStatus::NoPaymentRequired,
            _ => PaymentStatus::Unpaid,
        }
    }
}

/// Checkout data carried in the session metadata
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub user_id: Option<String>,

    /// Encoded cart, see [`crate::cart`]
    pub cart: String,

    pub coupon_code: Option<String>,
}

impl SessionMetadata {
    /// Read metadata from the provider's key-value map. Empty values count as absent.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let non_empty = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            user_id: non_empty(META_USER_ID),
            cart: map.get(META_CART).cloned().unwrap_or_default(),
            coupon_code: non_empty(META_COUPON_CODE),
        }
    }

    /// Write metadata in the provider's key-value form
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(META_USER_ID.to_string(), self.user_id.clone().unwrap_or_default());
        map.insert(META_CART.to_string(), self.cart.clone());
        map.insert(
            META_COUPON_CODE.to_string(),
            self.coupon_code.clone().unwrap_or_default(),
        );
        map
    }
}

/// A checkout session as confirmed by the payment provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Provider session identifier
    pub id: String,

    pub payment_status: PaymentStatus,

    /// Amount charged, in minor currency units
    pub amount_total: i64,

    pub metadata: SessionMetadata,
}

impl PaymentSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Amount charged in major currency units
    pub fn total_amount(&self) -> Decimal {
        Decimal::new(self.amount_total, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_metadata_empty_values_are_absent() {
        let mut map = HashMap::new();
        map.insert("userId".to_string(), String::new());
        map.insert("cart".to_string(), "a:1".to_string());
        map.insert("couponCode".to_string(), "  ".to_string());

        let meta = SessionMetadata::from_map(&map);
        assert_eq!(meta.user_id, None);
        assert_eq!(meta.coupon_code, None);
        assert_eq!(meta.cart, "a:1");
    }

    #[test]
    fn test_metadata_map_roundtrip() {
        let meta = SessionMetadata {
            user_id: Some("u1".into()),
            cart: "a:2;b:1".into(),
            coupon_code: Some("GIFTABCD".into()),
        };
        assert_eq!(SessionMetadata::from_map(&meta.to_map()), meta);
    }

    #[test]
    fn test_total_amount_in_major_units() {
        let session = PaymentSession {
            id: "cs_1".into(),
            payment_status: PaymentStatus::Paid,
            amount_total: 12345,
            metadata: SessionMetadata::default(),
        };
        assert_eq!(session.total_amount(), dec!(123.45));
        assert!(session.is_paid());
    }

    #[test]
    fn test_payment_status_parsing() {
        assert_eq!(PaymentStatus::from_str("paid"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_str("unpaid"), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::from_str("something"), PaymentStatus::Unpaid);
    }
}
