//! Order Completion
//!
//! Turns a paid payment session into exactly one persisted order. Both the
//! webhook receiver and the client confirmation endpoint call
//! [`OrderCompleter::on_payment_completed`]; repeated or concurrent calls for
//! the same session converge on a single order.
//!
//! ```text
//!  PaymentSession ──▶ decode cart ──▶ reconcile ──▶ insert (unique session id)
//!                                                        │
//!                                        newly inserted? ├─▶ decrement stock
//!                                                        ├─▶ redeem coupon
//!                                                        └─▶ issue gift coupon
//! ```

use futures::future::join_all;
use std::sync::Arc;

use crate::cart::decode_cart;
use crate::coupon::{self, CouponPolicy};
use crate::error::Result;
use crate::model::{Coupon, Order, OrderId};
use crate::reconcile::{reconcile, Reconciliation};
use crate::session::PaymentSession;
use crate::store::{CatalogStore, CouponStore, InsertOutcome, OrderStore, StockMutator};

/// What a completion call did
#[derive(Clone, Debug)]
pub enum CompletionOutcome {
    /// Session is not paid; nothing was written
    NotPaid,

    /// An order for this session already existed
    AlreadyRecorded { order_id: OrderId },

    /// A new order was written by this call
    Created {
        order: Order,
        gift_coupon: Option<Coupon>,
    },
}

impl CompletionOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            CompletionOutcome::NotPaid => "not_paid",
            CompletionOutcome::AlreadyRecorded { .. } => "already_recorded",
            CompletionOutcome::Created { .. } => "created",
        }
    }

    /// Order id for this session, if one exists
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            CompletionOutcome::NotPaid => None,
            CompletionOutcome::AlreadyRecorded { order_id } => Some(order_id),
            CompletionOutcome::Created { order, .. } => Some(&order.id),
        }
    }
}

/// Idempotent order creation for paid sessions
#[derive(Clone)]
pub struct OrderCompleter {
    catalog: Arc<dyn CatalogStore>,
    stock: Arc<dyn StockMutator>,
    orders: Arc<dyn OrderStore>,
    coupons: Arc<dyn CouponStore>,
    policy: CouponPolicy,
}

impl OrderCompleter {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        stock: Arc<dyn StockMutator>,
        orders: Arc<dyn OrderStore>,
        coupons: Arc<dyn CouponStore>,
        policy: CouponPolicy,
    ) -> Self {
        Self {
            catalog,
            stock,
            orders,
            coupons,
            policy,
        }
    }

    /// Record the order for a completed payment session.
    ///
    /// Side effects (stock, coupons) run only for the call that inserted the
    /// order; their failures are logged because the order itself is already
    /// durable by then.
    pub async fn on_payment_completed(&self, session: &PaymentSession) -> Result<CompletionOutcome> {
        if !session.is_paid() {
            tracing::debug!(
                session_id = %session.id,
                status = session.payment_status.as_str(),
                "Ignoring session that is not paid"
            );
            return Ok(CompletionOutcome::NotPaid);
        }

        if let Some(existing) = self.orders.find_by_session_id(&session.id).await? {
            tracing::info!(
                session_id = %session.id,
                order_id = %existing.id,
                "Order for session already exists"
            );
            return Ok(CompletionOutcome::AlreadyRecorded { order_id: existing.id });
        }

        let items = decode_cart(&session.metadata.cart);
        if items.is_empty() {
            tracing::warn!(session_id = %session.id, "Paid session carries no cart items");
        }

        let reconciliation = reconcile(self.catalog.as_ref(), &items).await?;
        let order = Order::completed(
            session.id.clone(),
            session.metadata.user_id.clone(),
            reconciliation.lines.clone(),
            session.total_amount(),
        );

        match self.orders.insert(&order).await? {
            InsertOutcome::Duplicate => {
                // Lost the race against a concurrent delivery for the same session
                let order_id = self
                    .orders
                    .find_by_session_id(&session.id)
                    .await?
                    .map_or_else(|| order.id.clone(), |o| o.id);
                tracing::info!(
                    session_id = %session.id,
                    order_id = %order_id,
                    "Order for session was recorded concurrently"
                );
                return Ok(CompletionOutcome::AlreadyRecorded { order_id });
            }
            InsertOutcome::Inserted => {
                tracing::info!(
                    order_id = %order.id,
                    session_id = %session.id,
                    lines = order.products.len(),
                    total = %order.total_amount,
                    "Created order from payment session"
                );
            }
        }

        self.decrement_stock(&order, &reconciliation).await;
        let gift_coupon = self.apply_coupons(session).await;

        Ok(CompletionOutcome::Created { order, gift_coupon })
    }

    async fn decrement_stock(&self, order: &Order, reconciliation: &Reconciliation) {
        let decrements = order
            .products
            .iter()
            .filter(|line| reconciliation.is_resolved(line))
            .map(|line| async move {
                if let Err(e) = self.stock.decrement(&line.product, line.quantity).await {
                    tracing::error!(
                        order_id = %order.id,
                        product = %line.product,
                        quantity = line.quantity,
                        error = %e,
                        "Failed to decrement stock"
                    );
                }
            });

        join_all(decrements).await;
    }

    async fn apply_coupons(&self, session: &PaymentSession) -> Option<Coupon> {
        let user_id = session.metadata.user_id.as_deref()?;

        if let Some(code) = session.metadata.coupon_code.as_deref() {
            if let Err(e) = coupon::redeem(self.coupons.as_ref(), code, user_id).await {
                tracing::error!(code = %code, user_id = %user_id, error = %e, "Failed to redeem coupon");
            }
        }

        if !self.policy.qualifies(session.amount_total) {
            return None;
        }

        match coupon::issue_gift_coupon(self.coupons.as_ref(), &self.policy, user_id).await {
            Ok(coupon) => Some(coupon),
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to issue gift coupon");
                None
            }
        }
    }
}
