//! MongoDB Stores
//!
//! Collections `products`, `orders` and `coupons`. Uniqueness of
//! `orders.paymentSessionId` and `coupons.code` is enforced by unique indexes,
//! so a duplicate insert surfaces as [`InsertOutcome::Duplicate`] no matter how
//! many deliveries race.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::error::Result;
use crate::model::{Coupon, Order, OrderStatus, Product};
use crate::store::{CatalogStore, CouponStore, InsertOutcome, OrderStore, StockMutator};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

/// Filter values matching a product id stored either as a string or as an
/// `ObjectId`
fn id_candidates(id: &str) -> Vec<Bson> {
    let mut candidates = vec![Bson::String(id.to_string())];
    if let Ok(oid) = ObjectId::parse_str(id) {
        candidates.push(Bson::ObjectId(oid));
    }
    candidates
}

/// All document-backed stores sharing one database
#[derive(Clone)]
pub struct MongoStores {
    pub catalog: MongoCatalog,
    pub orders: MongoOrderStore,
    pub coupons: MongoCouponStore,
}

impl MongoStores {
    pub fn new(db: &Database) -> Self {
        Self {
            catalog: MongoCatalog {
                products: db.collection("products"),
            },
            orders: MongoOrderStore {
                orders: db.collection("orders"),
            },
            coupons: MongoCouponStore {
                coupons: db.collection("coupons"),
            },
        }
    }

    /// Connect and make sure the unique indexes exist
    pub async fn connect(url: &str, db_name: &str) -> Result<Self> {
        let mut client_options = ClientOptions::parse(url).await?;
        client_options.app_name = Some("shop-server".to_string());

        let client = Client::with_options(client_options)?;
        let stores = Self::new(&client.database(db_name));
        stores.init_indexes().await?;

        Ok(stores)
    }

    pub async fn init_indexes(&self) -> Result<()> {
        let session_index = IndexModel::builder()
            .keys(doc! { "paymentSessionId": 1 })
            .options(
                IndexOptions::builder()
                    .name("order_payment_session_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.orders.orders.create_indexes([session_index], None).await?;

        let code_index = IndexModel::builder()
            .keys(doc! { "code": 1 })
            .options(
                IndexOptions::builder()
                    .name("coupon_code_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        let user_index = IndexModel::builder()
            .keys(doc! { "userId": 1 })
            .options(
                IndexOptions::builder()
                    .name("coupon_user_idx".to_string())
                    .build(),
            )
            .build();

        self.coupons
            .coupons
            .create_indexes([code_index, user_index], None)
            .await?;

        tracing::info!("Shop indexes initialized");
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoCatalog {
    products: Collection<Product>,
}

#[async_trait]
impl CatalogStore for MongoCatalog {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Product>> {
        let candidates: Vec<Bson> = ids.iter().flat_map(|id| id_candidates(id)).collect();
        let filter = doc! { "_id": { "$in": candidates } };
        let cursor = self.products.find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl StockMutator for MongoCatalog {
    async fn decrement(&self, product_id: &str, quantity: u32) -> Result<()> {
        let filter = doc! { "_id": { "$in": id_candidates(product_id) } };
        let delta = -i64::from(quantity);
        let update = doc! { "$inc": { "stock": delta } };
        self.products.update_one(filter, update, None).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoOrderStore {
    orders: Collection<Order>,
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Order>> {
        let filter = doc! { "paymentSessionId": session_id };
        Ok(self.orders.find_one(filter, None).await?)
    }

    async fn insert(&self, order: &Order) -> Result<InsertOutcome> {
        match self.orders.insert_one(order, None).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_recent(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let filter = match status {
            Some(status) => doc! { "status": status.as_str() },
            None => doc! {},
        };

        let cursor = self.orders.find(filter, None).await?;
        let mut orders: Vec<Order> = cursor.try_collect().await?;

        // createdAt is stored as RFC 3339 text, so order in memory
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[derive(Clone)]
pub struct MongoCouponStore {
    coupons: Collection<Coupon>,
}

#[async_trait]
impl CouponStore for MongoCouponStore {
    async fn find_active(&self, code: &str, user_id: &str) -> Result<Option<Coupon>> {
        let filter = doc! { "code": code, "userId": user_id, "isActive": true };
        let coupon = self.coupons.find_one(filter, None).await?;
        Ok(coupon.filter(Coupon::is_valid))
    }

    async fn deactivate(&self, code: &str, user_id: &str) -> Result<bool> {
        let filter = doc! { "code": code, "userId": user_id };
        let update = doc! { "$set": { "isActive": false } };
        let result = self.coupons.update_one(filter, update, None).await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64> {
        let result = self
            .coupons
            .delete_many(doc! { "userId": user_id }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn insert(&self, coupon: &Coupon) -> Result<InsertOutcome> {
        match self.coupons.insert_one(coupon, None).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_candidates_cover_both_shapes() {
        let hex = "65a1f0c2e4b0a1b2c3d4e5f6";
        let candidates = id_candidates(hex);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], Bson::String(hex.into()));
        assert_eq!(candidates[1], Bson::ObjectId(ObjectId::parse_str(hex).unwrap()));

        assert_eq!(id_candidates("jeans-01"), vec![Bson::String("jeans-01".into())]);
    }
}
