//! Collaborators the lifecycle calls out to.

use crate::models::{Amount, Invoice, InvoiceId, MessageRef, PaymentMethod, PaymentOutcome};
use anyhow::Result;
use async_trait::async_trait;

/// Applies what a settled payment buys (credits, plan days, ...).
///
/// Called at most once per invoice, so implementations need not be idempotent.
#[async_trait]
pub trait SettlementSink: Send + Sync {
    async fn apply(&self, user_id: i64, amount: Amount, context: &str) -> Result<()>;
}

/// Admin alerts and user-facing outcome messages. Best effort: failures are
/// logged by the caller and never change invoice state.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify_admin(
        &self,
        user_id: i64,
        amount: Amount,
        method: PaymentMethod,
        invoice_id: &InvoiceId,
        context: &str,
    ) -> Result<MessageRef>;

    async fn notify_user(&self, user_id: i64, outcome: &PaymentOutcome) -> Result<()>;

    /// Runs once the invoice is terminal: the admin alert and the user's
    /// payment prompt (`alert_ref` / `client_ref`) stop presenting it as open.
    async fn close_messages(&self, invoice: &Invoice) -> Result<()>;
}
