//! # shop-core
//!
//! Checkout domain logic for the storefront: cart metadata encoding, catalog
//! reconciliation and idempotent order completion.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── checkout time ────────────────────────────┐
//! │  Vec<CartItem> ──encode_cart──▶ "id:qty;id:qty"  (session metadata)     │
//! └────────────────────────────────────────────────────────────────────────┘
//! ┌──────────────────────── webhook / confirmation ───────────────────────┐
//! │  PaymentSession ─▶ decode_cart ─▶ reconcile ─▶ OrderStore::insert      │
//! │                                   (CatalogStore)   (unique session id) │
//! │                                                     └─▶ StockMutator   │
//! │                                                     └─▶ CouponStore    │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage sits behind the traits in [`store`]; in-memory implementations are
//! always available and MongoDB ones are enabled with the `mongo` feature.

pub mod cart;
pub mod completion;
pub mod coupon;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod store;

#[cfg(feature = "mongo")]
pub mod mongo;

pub use cart::{decode_cart, encode_cart, CartItem, MAX_ENCODED_CART_LEN};
pub use completion::{CompletionOutcome, OrderCompleter};
pub use coupon::CouponPolicy;
pub use error::{Result, ShopError};
pub use model::{Coupon, Order, OrderId, OrderLine, OrderStatus, Product};
pub use session::{PaymentSession, PaymentStatus, SessionMetadata};
pub use store::{
    CatalogStore, CouponStore, InsertOutcome, MemoryCatalog, MemoryCouponStore, MemoryOrderStore,
    OrderStore, StockMutator,
};
