//! Mock Payment Provider
//!
//! Keeps sessions in memory. Sessions start unpaid; tests flip them with
//! [`MockPaymentProvider::mark_paid`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use shop_core::{PaymentSession, PaymentStatus};

use crate::checkout::{CheckoutRequest, CheckoutSession};
use crate::error::{PaymentError, Result};
use crate::provider::PaymentProvider;

/// In-memory payment provider
#[derive(Default)]
pub struct MockPaymentProvider {
    sessions: RwLock<HashMap<String, PaymentSession>>,
    counter: AtomicU64,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session directly, bypassing checkout creation
    pub async fn insert_session(&self, session: PaymentSession) {
        self.sessions.write().await.insert(session.id.clone(), session);
    }

    /// Mark a session as paid. Returns false if the session is unknown.
    pub async fn mark_paid(&self, session_id: &str) -> bool {
        match self.sessions.write().await.get_mut(session_id) {
            Some(session) => {
                session.payment_status = PaymentStatus::Paid;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        request.validate()?;

        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("cs_test_mock_{n}");
        let amount_total = request.total_minor()?;

        let session = PaymentSession {
            id: id.clone(),
            payment_status: PaymentStatus::Unpaid,
            amount_total,
            metadata: request.metadata(),
        };
        self.insert_session(session).await;

        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.mock/pay/{id}"),
            id,
            amount_total,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentSession> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::SessionNotFound(session_id.to_string()))
    }
}
