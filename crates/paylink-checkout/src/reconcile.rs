//! Order reconciliation driven by payment webhooks.

use crate::orders::{OrderApi, STATUS_PROCESSING};
use crate::stripe::webhook::{WebhookEvent, WebhookEventKind};
use crate::stripe::CheckoutSession;
use paylink_core::{OrderId, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// What handling a webhook event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    OrderMarkedProcessing(OrderId),
    /// The order was already `processing` or `completed`.
    AlreadySettled { order_id: OrderId, status: String },
    /// The session expired unpaid; only logged.
    Expired { reference: Option<String> },
    /// Not an event (or not a session) this service acts on.
    Ignored,
}

#[derive(Clone)]
pub struct WebhookProcessor {
    orders: Arc<dyn OrderApi>,
}

impl WebhookProcessor {
    pub fn new(orders: Arc<dyn OrderApi>) -> Self {
        Self { orders }
    }

    /// Applies a verified event. Order API failures are returned so the
    /// caller can answer with a retryable status.
    pub async fn process(&self, event: &WebhookEvent) -> Result<ReconcileOutcome> {
        match &event.kind {
            WebhookEventKind::CheckoutSessionCompleted(session) => {
                self.session_completed(session).await
            }
            WebhookEventKind::CheckoutSessionExpired(session) => {
                info!(
                    event_id = %event.id,
                    order_ref = ?session.client_reference_id,
                    "checkout session expired"
                );
                Ok(ReconcileOutcome::Expired {
                    reference: session.client_reference_id.clone(),
                })
            }
            WebhookEventKind::Other(kind) => {
                debug!(event_id = %event.id, event_type = %kind, "ignoring webhook event");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn session_completed(&self, session: &CheckoutSession) -> Result<ReconcileOutcome> {
        let Some(order_id) = session.order_id() else {
            debug!(session_id = %session.id, "completed session has no order reference");
            return Ok(ReconcileOutcome::Ignored);
        };
        if session.mode.as_deref() != Some("payment")
            || session.payment_status.as_deref() != Some("paid")
        {
            debug!(
                session_id = %session.id,
                mode = ?session.mode,
                payment_status = ?session.payment_status,
                "completed session is not a paid payment"
            );
            return Ok(ReconcileOutcome::Ignored);
        }

        let current = self.orders.get_order(order_id).await?;
        if current.is_settled() {
            info!(order_id = %order_id, status = %current.status, "order already settled");
            return Ok(ReconcileOutcome::AlreadySettled {
                order_id,
                status: current.status,
            });
        }

        self.orders
            .update_order_status(order_id, STATUS_PROCESSING)
            .await?;
        info!(order_id = %order_id, previous = %current.status, "order marked processing");
        Ok(ReconcileOutcome::OrderMarkedProcessing(order_id))
    }
}
