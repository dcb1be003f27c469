//! Coupon Lifecycle
//!
//! Redemption of the coupon used at checkout and issuance of gift coupons
//! after large purchases.

use chrono::Duration;
use uuid::Uuid;

use crate::error::{Result, ShopError};
use crate::model::Coupon;
use crate::store::{CouponStore, InsertOutcome};

/// Rules for gift coupon issuance
#[derive(Clone, Debug)]
pub struct CouponPolicy {
    /// Minimum provider-confirmed total, in minor units, that earns a gift coupon
    pub issue_threshold_minor: i64,

    /// Discount of issued coupons (0-100)
    pub discount_percentage: u8,

    /// Lifetime of issued coupons
    pub valid_for: Duration,

    /// Prefix of generated codes
    pub code_prefix: String,

    /// Random characters after the prefix
    pub code_length: usize,

    /// Fresh codes tried before giving up on collisions
    pub max_code_attempts: usize,
}

impl Default for CouponPolicy {
    fn default() -> Self {
        Self {
            issue_threshold_minor: 20_000, // $200
            discount_percentage: 10,
            valid_for: Duration::days(30),
            code_prefix: "GIFT".into(),
            code_length: 8,
            max_code_attempts: 5,
        }
    }
}

impl CouponPolicy {
    /// Whether a purchase of `amount_minor` earns a gift coupon
    pub fn qualifies(&self, amount_minor: i64) -> bool {
        amount_minor >= self.issue_threshold_minor
    }

    /// Generate a random code like `GIFT3FA91C0D`
    pub fn generate_code(&self) -> String {
        let random = Uuid::new_v4().simple().to_string().to_uppercase();
        let length = self.code_length.min(random.len());
        format!("{}{}", self.code_prefix, &random[..length])
    }
}

/// Deactivate the coupon a user redeemed at checkout
pub async fn redeem(store: &dyn CouponStore, code: &str, user_id: &str) -> Result<bool> {
    let matched = store.deactivate(code, user_id).await?;

    if matched {
        tracing::info!(code = %code, user_id = %user_id, "Redeemed coupon");
    } else {
        tracing::warn!(code = %code, user_id = %user_id, "Redeemed coupon not found for user");
    }

    Ok(matched)
}

/// Replace a user's coupons with a freshly generated gift coupon
pub async fn issue_gift_coupon(
    store: &dyn CouponStore,
    policy: &CouponPolicy,
    user_id: &str,
) -> Result<Coupon> {
    let removed = store.delete_by_user(user_id).await?;
    if removed > 0 {
        tracing::debug!(user_id = %user_id, removed, "Removed previous coupons");
    }

    for attempt in 1..=policy.max_code_attempts {
        let coupon = Coupon::new(
            policy.generate_code(),
            user_id,
            policy.discount_percentage,
            policy.valid_for,
        );

        match store.insert(&coupon).await? {
            InsertOutcome::Inserted => {
                tracing::info!(
                    code = %coupon.code,
                    user_id = %user_id,
                    discount = coupon.discount_percentage,
                    expires = %coupon.expiration_date,
                    "Issued gift coupon"
                );
                return Ok(coupon);
            }
            InsertOutcome::Duplicate => {
                tracing::warn!(attempt, code = %coupon.code, "Coupon code collision, retrying");
            }
        }
    }

    Err(ShopError::CouponCodeExhausted(policy.max_code_attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCouponStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_threshold_boundary() {
        let policy = CouponPolicy::default();
        assert!(policy.qualifies(20_000));
        assert!(!policy.qualifies(19_999));
    }

    #[test]
    fn test_generated_code_shape() {
        let policy = CouponPolicy::default();
        let code = policy.generate_code();
        assert_eq!(code.len(), 12);
        assert!(code.starts_with("GIFT"));
        assert!(code[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(code, policy.generate_code());
    }

    #[tokio::test]
    async fn test_issue_replaces_existing_coupons() {
        let store = MemoryCouponStore::new();
        let policy = CouponPolicy::default();
        store
            .insert(&Coupon::new("OLDCODE", "u1", 15, Duration::days(3)))
            .await
            .unwrap();

        let coupon = issue_gift_coupon(&store, &policy, "u1").await.unwrap();

        let coupons = store.coupons_for("u1");
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].code, coupon.code);
        assert_eq!(coupon.discount_percentage, 10);
        assert!(coupon.is_valid());
        assert!(coupon.expiration_date > chrono::Utc::now() + Duration::days(29));
    }

    /// Rejects the first `collisions` inserts as duplicates
    struct CollidingStore {
        inner: MemoryCouponStore,
        collisions: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl CouponStore for CollidingStore {
        async fn find_active(&self, code: &str, user_id: &str) -> Result<Option<Coupon>> {
            self.inner.find_active(code, user_id).await
        }

        async fn deactivate(&self, code: &str, user_id: &str) -> Result<bool> {
            self.inner.deactivate(code, user_id).await
        }

        async fn delete_by_user(&self, user_id: &str) -> Result<u64> {
            self.inner.delete_by_user(user_id).await
        }

        async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) < self.collisions {
                return Ok(InsertOutcome::Duplicate);
            }
            self.inner.insert(coupon).await
        }
    }

    #[tokio::test]
    async fn test_issue_retries_on_collision() {
        let store = CollidingStore {
            inner: MemoryCouponStore::new(),
            collisions: 2,
            attempts: AtomicUsize::new(0),
        };

        issue_gift_coupon(&store, &CouponPolicy::default(), "u1").await.unwrap();
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_issue_gives_up_after_max_attempts() {
        let store = CollidingStore {
            inner: MemoryCouponStore::new(),
            collisions: usize::MAX,
            attempts: AtomicUsize::new(0),
        };

        let err = issue_gift_coupon(&store, &CouponPolicy::default(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::CouponCodeExhausted(5)));
    }

    #[tokio::test]
    async fn test_redeem_deactivates() {
        let store = MemoryCouponStore::new();
        store
            .insert(&Coupon::new("GIFTAAAA", "u1", 10, Duration::days(30)))
            .await
            .unwrap();

        assert!(redeem(&store, "GIFTAAAA", "u1").await.unwrap());
        assert!(store.find_active("GIFTAAAA", "u1").await.unwrap().is_none());
        assert!(!redeem(&store, "NOPE", "u1").await.unwrap());
    }
}
