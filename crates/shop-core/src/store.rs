//! Storage Traits
//!
//! Seams to the catalog, order and coupon persistence, plus in-memory
//! implementations for development and tests.
//!
//! Inserts report [`InsertOutcome::Duplicate`] instead of failing when a
//! unique key is already taken. Callers rely on that for idempotence, so an
//! implementation must make the check and the write a single atomic step.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, ShopError};
use crate::model::{Coupon, Order, OrderStatus, Product};

/// Result of inserting a document with a unique key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A document with the same unique key already exists
    Duplicate,
}

/// Product catalog lookups
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch every product whose id is in `ids`. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Product>>;
}

/// Post-purchase inventory updates
#[async_trait]
pub trait StockMutator: Send + Sync {
    /// Lower a product's stock by `quantity`. Unknown products are ignored.
    async fn decrement(&self, product_id: &str, quantity: u32) -> Result<()>;
}

/// Order persistence
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Order>>;

    /// Insert unless an order for the same payment session exists
    async fn insert(&self, order: &Order) -> Result<InsertOutcome>;

    /// Orders newest first, optionally restricted to one status
    async fn list_recent(&self, status: Option<OrderStatus>) -> Result<Vec<Order>>;
}

/// Coupon persistence
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Coupon with `code` owned by `user_id`, if it is still valid
    async fn find_active(&self, code: &str, user_id: &str) -> Result<Option<Coupon>>;

    /// Mark a user's coupon inactive. Returns whether a coupon matched.
    async fn deactivate(&self, code: &str, user_id: &str) -> Result<bool>;

    /// Remove all coupons of a user. Returns how many were removed.
    async fn delete_by_user(&self, user_id: &str) -> Result<u64>;

    /// Insert unless the code is already taken
    async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome>;
}

fn poisoned<T>(_: T) -> ShopError {
    ShopError::Storage("in-memory store lock poisoned".into())
}

/// In-memory catalog (for development)
pub struct MemoryCatalog {
    products: RwLock<HashMap<String, Product>>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        if let Ok(mut map) = catalog.products.write() {
            map.extend(products.into_iter().map(|p| (p.id.clone(), p)));
        }
        catalog
    }

    /// Current stock of a product
    pub fn stock(&self, product_id: &str) -> Option<i64> {
        self.products.read().ok()?.get(product_id).map(|p| p.stock)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Product>> {
        let products = self.products.read().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }
}

#[async_trait]
impl StockMutator for MemoryCatalog {
    async fn decrement(&self, product_id: &str, quantity: u32) -> Result<()> {
        let mut products = self.products.write().map_err(poisoned)?;
        if let Some(product) = products.get_mut(product_id) {
            product.stock -= i64::from(quantity);
        }
        Ok(())
    }
}

/// In-memory order store (for development)
pub struct MemoryOrderStore {
    by_session: RwLock<HashMap<String, Order>>,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            by_session: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.by_session.read().map(|orders| orders.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Order>> {
        let orders = self.by_session.read().map_err(poisoned)?;
        Ok(orders.get(session_id).cloned())
    }

    async fn insert(&self, order: &Order) -> Result<InsertOutcome> {
        let mut orders = self.by_session.write().map_err(poisoned)?;

        if orders.contains_key(&order.payment_session_id) {
            return Ok(InsertOutcome::Duplicate);
        }

        orders.insert(order.payment_session_id.clone(), order.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn list_recent(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let orders = self.by_session.read().map_err(poisoned)?;

        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| status.is_none_or(|s| order.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching)
    }
}

/// In-memory coupon store (for development)
pub struct MemoryCouponStore {
    by_code: RwLock<HashMap<String, Coupon>>,
}

impl Default for MemoryCouponStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCouponStore {
    pub fn new() -> Self {
        Self {
            by_code: RwLock::new(HashMap::new()),
        }
    }

    /// All coupons of a user, active or not
    pub fn coupons_for(&self, user_id: &str) -> Vec<Coupon> {
        self.by_code
            .read()
            .map(|coupons| {
                coupons
                    .values()
                    .filter(|c| c.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
    async fn find_active(&self, code: &str, user_id: &str) -> Result<Option<Coupon>> {
        let coupons = self.by_code.read().map_err(poisoned)?;
        Ok(coupons
            .get(code)
            .filter(|c| c.user_id == user_id && c.is_valid())
            .cloned())
    }

    async fn deactivate(&self, code: &str, user_id: &str) -> Result<bool> {
        let mut coupons = self.by_code.write().map_err(poisoned)?;
        match coupons.get_mut(code).filter(|c| c.user_id == user_id) {
            Some(coupon) => {
                coupon.deactivate();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64> {
        let mut coupons = self.by_code.write().map_err(poisoned)?;
        let before = coupons.len();
        coupons.retain(|_, c| c.user_id != user_id);
        Ok((before - coupons.len()) as u64)
    }

    async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome> {
        let mut coupons = self.by_code.write().map_err(poisoned)?;

        if coupons.contains_key(&coupon.code) {
            return Ok(InsertOutcome::Duplicate);
        }

        coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(InsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_catalog_skips_unknown_ids() {
        let catalog = MemoryCatalog::with_products([Product::new("p1", "Mug", dec!(12), 5)]);

        let found = catalog
            .find_by_ids(&["p1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p1");
    }

    #[tokio::test]
    async fn test_stock_decrement() {
        let catalog = MemoryCatalog::with_products([Product::new("p1", "Mug", dec!(12), 5)]);

        catalog.decrement("p1", 2).await.unwrap();
        catalog.decrement("missing", 2).await.unwrap();
        assert_eq!(catalog.stock("p1"), Some(3));
    }

    #[tokio::test]
    async fn test_order_insert_is_unique_per_session() {
        let store = MemoryOrderStore::new();
        let first = Order::completed("cs_1", None, vec![], dec!(10));
        let second = Order::completed("cs_1", None, vec![], dec!(10));

        assert_eq!(store.insert(&first).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(&second).await.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.len(), 1);

        let stored = store.find_by_session_id("cs_1").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let store = MemoryOrderStore::new();
        let mut older = Order::completed("cs_old", None, vec![], dec!(1));
        older.created_at -= Duration::hours(1);
        let mut failed = Order::completed("cs_failed", None, vec![], dec!(1));
        failed.status = OrderStatus::Failed;
        let newer = Order::completed("cs_new", None, vec![], dec!(1));

        store.insert(&older).await.unwrap();
        store.insert(&failed).await.unwrap();
        store.insert(&newer).await.unwrap();

        let completed = store.list_recent(Some(OrderStatus::Completed)).await.unwrap();
        let sessions: Vec<_> = completed.iter().map(|o| o.payment_session_id.as_str()).collect();
        assert_eq!(sessions, vec!["cs_new", "cs_old"]);

        assert_eq!(store.list_recent(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_coupon_lifecycle() {
        let store = MemoryCouponStore::new();
        let coupon = Coupon::new("GIFTAAAA", "u1", 10, Duration::days(30));

        assert_eq!(store.insert(&coupon).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(&coupon).await.unwrap(), InsertOutcome::Duplicate);

        assert!(store.find_active("GIFTAAAA", "u1").await.unwrap().is_some());
        assert!(store.find_active("GIFTAAAA", "someone-else").await.unwrap().is_none());

        assert!(!store.deactivate("GIFTAAAA", "someone-else").await.unwrap());
        assert!(store.deactivate("GIFTAAAA", "u1").await.unwrap());
        assert!(store.find_active("GIFTAAAA", "u1").await.unwrap().is_none());

        assert_eq!(store.delete_by_user("u1").await.unwrap(), 1);
        assert!(store.coupons_for("u1").is_empty());
    }
}
