//! Stripe Webhook Handling
//!
//! Turns signed checkout events into order completions.

use std::sync::Arc;
use stripe::{Event, EventObject, EventType, Webhook};

use shop_core::{CompletionOutcome, OrderCompleter, PaymentSession};

use crate::checkout::payment_session_from_stripe;
use crate::error::{PaymentError, Result};

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Checkout finished; the session may still be awaiting an async payment
    CheckoutCompleted { session: PaymentSession },

    /// Delayed payment method (bank debit etc.) settled
    AsyncPaymentSucceeded { session: PaymentSession },

    /// Delayed payment method failed; nothing to record
    AsyncPaymentFailed { session_id: String },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler {
    completer: Arc<OrderCompleter>,
}

impl WebhookHandler {
    pub fn new(completer: Arc<OrderCompleter>) -> Self {
        Self { completer }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(payload: &str, signature: &str, secret: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, secret)
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Process a verified Stripe event
    pub async fn handle(&self, event: Event) -> Result<Option<CompletionOutcome>> {
        tracing::info!(event_type = ?event.type_, event_id = %event.id, "Processing Stripe webhook");

        let parsed = Self::parse_webhook_event(&event)?;
        self.process(&parsed).await
    }

    /// Act on a parsed event. Returns the completion outcome for events that
    /// carry a session to record.
    pub async fn process(&self, event: &WebhookEvent) -> Result<Option<CompletionOutcome>> {
        match event {
            WebhookEvent::CheckoutCompleted { session }
            | WebhookEvent::AsyncPaymentSucceeded { session } => {
                let outcome = self.completer.on_payment_completed(session).await?;

                tracing::info!(
                    session_id = %session.id,
                    outcome = outcome.as_str(),
                    order_id = ?outcome.order_id().map(|id| id.as_str()),
                    "Webhook checkout processed"
                );

                Ok(Some(outcome))
            }

            WebhookEvent::AsyncPaymentFailed { session_id } => {
                tracing::warn!(session_id = %session_id, "Async payment failed");
                Ok(None)
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
                Ok(None)
            }
        }
    }

    /// Parse Stripe event into our event type
    pub fn parse_webhook_event(event: &Event) -> Result<WebhookEvent> {
        let session = || match &event.data.object {
            EventObject::CheckoutSession(session) => Ok(session),
            _ => Err(PaymentError::WebhookParse("Invalid checkout session data".into())),
        };

        match event.type_ {
            EventType::CheckoutSessionCompleted => Ok(WebhookEvent::CheckoutCompleted {
                session: payment_session_from_stripe(session()?),
            }),

            EventType::CheckoutSessionAsyncPaymentSucceeded => {
                Ok(WebhookEvent::AsyncPaymentSucceeded {
                    session: payment_session_from_stripe(session()?),
                })
            }

            EventType::CheckoutSessionAsyncPaymentFailed => Ok(WebhookEvent::AsyncPaymentFailed {
                session_id: session()?.id.to_string(),
            }),

            _ => Ok(WebhookEvent::Other {
                event_type: format!("{:?}", event.type_),
            }),
        }
    }
}
