//! Webhook and verify-button entry points. Both end in
//! [`LifecycleManager::settle`], so neither ordering nor redelivery matters.

use crate::error::PayError;
use crate::lifecycle::{LifecycleManager, SettleOutcome};
use crate::models::{ExternalRef, InvoiceId, InvoiceStatus, PaymentState};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Body the gateway pushes to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotice {
    pub pay_id: String,
    pub status: String,
}

impl WebhookNotice {
    pub fn is_paid(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "success" | "paid")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// This call settled the invoice
    Settled,
    AlreadySettled,
    /// Gateway has not seen the money yet
    Pending,
    /// Gateway does not know the invoice; it was failed
    Failed,
    /// Invoice had already ended without settlement
    Closed,
    /// Webhook status was not a payment confirmation
    Ignored,
    /// Webhook referenced an invoice we do not track
    Unknown,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Settled => "settled",
            ReconcileOutcome::AlreadySettled => "already_settled",
            ReconcileOutcome::Pending => "pending",
            ReconcileOutcome::Failed => "failed",
            ReconcileOutcome::Closed => "closed",
            ReconcileOutcome::Ignored => "ignored",
            ReconcileOutcome::Unknown => "unknown",
        }
    }
}

impl From<&SettleOutcome> for ReconcileOutcome {
    fn from(outcome: &SettleOutcome) -> Self {
        match outcome {
            SettleOutcome::Won(_) => ReconcileOutcome::Settled,
            SettleOutcome::AlreadySettled(_) => ReconcileOutcome::AlreadySettled,
            SettleOutcome::Closed(_) => ReconcileOutcome::Closed,
        }
    }
}

#[derive(Clone)]
pub struct ReconciliationReceiver {
    manager: LifecycleManager,
}

impl ReconciliationReceiver {
    pub fn new(manager: LifecycleManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    /// Gateway push. Safe to call any number of times for the same notice.
    pub async fn on_webhook(&self, notice: &WebhookNotice) -> Result<ReconcileOutcome, PayError> {
        let id = InvoiceId::new(notice.pay_id.clone());

        if self.manager.get(&id).is_none() {
            warn!("Webhook for unknown invoice {} (status {})", id, notice.status);
            return Ok(ReconcileOutcome::Unknown);
        }

        if !notice.is_paid() {
            info!("Webhook for invoice {} with status {}, no action", id, notice.status);
            return Ok(ReconcileOutcome::Ignored);
        }

        let outcome = self.manager.settle(&id).await?;
        Ok(ReconcileOutcome::from(&outcome))
    }

    /// User pressed "verify": ask the gateway, settle if paid.
    pub async fn verify(&self, id: &InvoiceId, requester: i64) -> Result<ReconcileOutcome, PayError> {
        let invoice = self
            .manager
            .get(id)
            .ok_or_else(|| PayError::NotFound(id.clone()))?;
        self.manager.authorize(&invoice, requester)?;

        match invoice.status {
            InvoiceStatus::Settled => return Ok(ReconcileOutcome::AlreadySettled),
            status if status.is_terminal() => return Ok(ReconcileOutcome::Closed),
            _ => {}
        }

        self.poll(id, &invoice.external_ref).await
    }

    /// Polls the gateway for every open invoice, e.g. after a restart.
    /// Returns how many were settled.
    pub async fn reconcile_open(&self) -> usize {
        let mut settled = 0;

        for invoice in self.manager.store().list_open() {
            match self.poll(&invoice.id, &invoice.external_ref).await {
                Ok(ReconcileOutcome::Settled) => settled += 1,
                Ok(_) => {}
                Err(e) => warn!("Startup reconciliation of invoice {} failed: {}", invoice.id, e),
            }
        }

        if settled > 0 {
            info!("Startup reconciliation settled {} invoice(s)", settled);
        }
        settled
    }

    async fn poll(&self, id: &InvoiceId, external_ref: &ExternalRef) -> Result<ReconcileOutcome, PayError> {
        let state = self.manager.gateway().check_status(external_ref).await?;

        match state {
            PaymentState::Paid => {
                let outcome = self.manager.settle(id).await?;
                Ok(ReconcileOutcome::from(&outcome))
            }
            PaymentState::Pending => Ok(ReconcileOutcome::Pending),
            PaymentState::NotFound => {
                if self.manager.fail(id).await? {
                    Ok(ReconcileOutcome::Failed)
                } else {
                    let status = self.manager.get(id).map(|inv| inv.status);
                    Ok(match status {
                        Some(InvoiceStatus::Settled) => ReconcileOutcome::AlreadySettled,
                        _ => ReconcileOutcome::Closed,
                    })
                }
            }
        }
    }
}
