//! Invoice lifecycle: creation, settlement, cancellation and expiry.
//!
//! Every state change goes through [`InvoiceStore::transition`], and only the
//! caller whose transition reports `changed` performs side effects (journal
//! write, settlement, user notification). That flag is what makes settlement
//! exactly-once when the webhook and the verify button race.

use crate::error::{JournalError, PayError, StoreError};
use crate::gateway::PaymentGateway;
use crate::models::{Amount, Invoice, InvoiceId, InvoiceStatus, MessageRef, PaymentMethod, PaymentOutcome};
use crate::ports::{NotificationDispatcher, SettlementSink};
use crate::repositories::InvoiceJournal;
use crate::store::{InvoiceStore, Transition};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Attempts at journaling a `Settled` row before giving up on the sink.
const SETTLED_RECORD_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long an invoice stays payable
    pub ttl: Duration,
    /// May cancel any invoice
    pub admin_id: Option<i64>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(10),
            admin_id: None,
        }
    }
}

/// Returned to the caller of [`LifecycleManager::create_invoice`] for display.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedInvoice {
    pub invoice_id: InvoiceId,
    pub pay_link: String,
    pub amount: Amount,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// This call moved the invoice to `Settled` and ran the settlement sink
    Won(Invoice),
    /// Someone else already settled it
    AlreadySettled(Invoice),
    /// The invoice ended another way (cancelled, expired, failed) first
    Closed(Invoice),
}

impl SettleOutcome {
    pub fn won(&self) -> bool {
        matches!(self, SettleOutcome::Won(_))
    }

    pub fn invoice(&self) -> &Invoice {
        match self {
            SettleOutcome::Won(inv) | SettleOutcome::AlreadySettled(inv) | SettleOutcome::Closed(inv) => inv,
        }
    }
}

#[derive(Clone)]
pub struct LifecycleManager {
    store: InvoiceStore,
    gateway: Arc<dyn PaymentGateway>,
    sink: Arc<dyn SettlementSink>,
    notifier: Arc<dyn NotificationDispatcher>,
    journal: Arc<dyn InvoiceJournal>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(
        store: InvoiceStore,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn SettlementSink>,
        notifier: Arc<dyn NotificationDispatcher>,
        journal: Arc<dyn InvoiceJournal>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            sink,
            notifier,
            journal,
            config,
        }
    }

    pub fn store(&self) -> &InvoiceStore {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn get(&self, id: &InvoiceId) -> Option<Invoice> {
        self.store.get(id)
    }

    pub fn active_for_user(&self, user_id: i64) -> Option<Invoice> {
        self.store.active_for_user(user_id)
    }

    pub async fn create_invoice(
        &self,
        user_id: i64,
        amount: Amount,
        context: &str,
    ) -> Result<CreatedInvoice, PayError> {
        let reservation = self.store.try_acquire_lock(user_id).map_err(|e| {
            info!("User {} tried to open a second invoice", user_id);
            store_err(e)
        })?;

        // Dropping the reservation on the error path frees the slot again.
        let handle = self
            .gateway
            .create_invoice(user_id, amount, context)
            .await
            .map_err(|e| {
                warn!("Invoice creation for user {} failed at {}: {}", user_id, self.gateway.name(), e);
                PayError::from(e)
            })?;

        let now = Utc::now();
        let invoice = Invoice {
            id: InvoiceId::new(handle.pay_id.clone()),
            user_id,
            amount,
            context: context.to_string(),
            status: InvoiceStatus::Created,
            created_at: now,
            expires_at: now + self.config.ttl,
            updated_at: now,
            external_ref: handle.external_ref(),
            settled_once: false,
            alert_ref: None,
            client_ref: None,
        };

        let invoice = reservation.insert(invoice).map_err(store_err)?;
        let invoice = self
            .store
            .transition(&invoice.id, InvoiceStatus::AwaitingPayment)
            .map_err(store_err)?
            .invoice;

        info!(
            "Invoice {} created for user {}: {} ({}), expires {}",
            invoice.id, user_id, amount, context, invoice.expires_at
        );
        self.record(&invoice).await;

        match self
            .notifier
            .notify_admin(user_id, amount, PaymentMethod::Upi, &invoice.id, context)
            .await
        {
            Ok(alert) => {
                if self.store.attach_alert_ref(&invoice.id, alert) {
                    if let Some(current) = self.store.get(&invoice.id) {
                        self.record(&current).await;
                    }
                }
            }
            Err(e) => warn!("Admin alert for invoice {} failed: {}", invoice.id, e),
        }

        Ok(CreatedInvoice {
            invoice_id: invoice.id,
            pay_link: invoice.external_ref.pay_link,
            amount,
            expires_at: invoice.expires_at,
        })
    }

    /// Marks the invoice paid. Only the winning caller applies the settlement.
    pub async fn settle(&self, id: &InvoiceId) -> Result<SettleOutcome, PayError> {
        let t = match self.store.transition(id, InvoiceStatus::Settled) {
            Ok(t) => t,
            Err(StoreError::InvalidTransition { from, to, .. }) => {
                warn!("Ignoring settle of invoice {}: {} -> {} not allowed", id, from, to);
                let invoice = self.store.get(id).ok_or_else(|| PayError::NotFound(id.clone()))?;
                return Ok(SettleOutcome::Closed(invoice));
            }
            Err(e) => return Err(store_err(e)),
        };

        if !t.changed {
            return Ok(match t.invoice.status {
                InvoiceStatus::Settled => {
                    info!("Invoice {} already settled, skipping", id);
                    SettleOutcome::AlreadySettled(t.invoice)
                }
                status => {
                    warn!(
                        "Payment reported for invoice {} of user {} after it was {}; needs manual review",
                        id, t.invoice.user_id, status
                    );
                    SettleOutcome::Closed(t.invoice)
                }
            });
        }

        log_transition(&t);
        let invoice = t.invoice;

        // Durable before the sink runs, so a restart never settles twice. If
        // the row cannot be written the journal still says open, and the
        // startup reconciliation credits it instead.
        match self.record_settled(&invoice).await {
            Ok(()) => {
                if let Err(e) = self
                    .sink
                    .apply(invoice.user_id, invoice.amount, &invoice.context)
                    .await
                {
                    error!(
                        "Settlement of invoice {} for user {} ({} / {}) failed: {}; manual credit required",
                        invoice.id, invoice.user_id, invoice.amount, invoice.context, e
                    );
                }
            }
            Err(e) => error!(
                "Invoice {} for user {} ({} / {}) is paid but could not be journaled: {}; \
                 not crediting now, it is credited on the next start or manually",
                invoice.id, invoice.user_id, invoice.amount, invoice.context, e
            ),
        }

        self.finish(
            &invoice,
            PaymentOutcome::Settled {
                invoice_id: invoice.id.clone(),
                amount: invoice.amount,
                context: invoice.context.clone(),
            },
        )
        .await;

        Ok(SettleOutcome::Won(invoice))
    }

    /// Cancels an invoice still awaiting payment. Owner or admin only.
    pub async fn cancel(&self, id: &InvoiceId, requester: i64) -> Result<Invoice, PayError> {
        let current = self.store.get(id).ok_or_else(|| PayError::NotFound(id.clone()))?;
        self.authorize(&current, requester)?;

        if current.status != InvoiceStatus::AwaitingPayment {
            return Err(PayError::CancelRejected {
                id: id.clone(),
                status: current.status,
            });
        }

        let t = match self.store.transition(id, InvoiceStatus::Cancelled) {
            Ok(t) => t,
            Err(StoreError::InvalidTransition { from, .. }) => {
                return Err(PayError::CancelRejected {
                    id: id.clone(),
                    status: from,
                });
            }
            Err(e) => return Err(store_err(e)),
        };

        // Lost the race to settle/expire between the read above and the CAS.
        if !t.changed {
            return Err(PayError::CancelRejected {
                id: id.clone(),
                status: t.invoice.status,
            });
        }

        log_transition(&t);
        self.record(&t.invoice).await;
        self.finish(
            &t.invoice,
            PaymentOutcome::Cancelled {
                invoice_id: id.clone(),
            },
        )
        .await;

        Ok(t.invoice)
    }

    /// The gateway disowned the invoice. Returns whether this call failed it.
    pub async fn fail(&self, id: &InvoiceId) -> Result<bool, PayError> {
        let t = match self.store.transition(id, InvoiceStatus::Failed) {
            Ok(t) => t,
            Err(StoreError::InvalidTransition { from, to, .. }) => {
                warn!("Ignoring fail of invoice {}: {} -> {} not allowed", id, from, to);
                return Ok(false);
            }
            Err(e) => return Err(store_err(e)),
        };

        if !t.changed {
            return Ok(false);
        }

        log_transition(&t);
        self.record(&t.invoice).await;
        self.finish(
            &t.invoice,
            PaymentOutcome::Failed {
                invoice_id: id.clone(),
            },
        )
        .await;
        Ok(true)
    }

    /// Expires every overdue invoice, freeing its user lock. Returns how many
    /// this sweep expired; invoices settled or cancelled concurrently are skipped.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;

        for invoice in self.store.list_expired(now) {
            let t = match self.store.transition(&invoice.id, InvoiceStatus::Expired) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Could not expire invoice {}: {}", invoice.id, e);
                    continue;
                }
            };
            if !t.changed {
                continue;
            }

            log_transition(&t);
            self.record(&t.invoice).await;
            self.finish(
                &t.invoice,
                PaymentOutcome::Expired {
                    invoice_id: t.invoice.id.clone(),
                },
            )
            .await;
            expired += 1;
        }

        if expired > 0 {
            info!("Expiry sweep closed {} invoice(s)", expired);
        }
        expired
    }

    /// Records the payment prompt shown to the user so it can be closed when
    /// the invoice ends. Returns false if the invoice already ended, in which
    /// case the caller closes the prompt itself.
    pub async fn attach_invoice_message(&self, id: &InvoiceId, prompt: MessageRef) -> bool {
        if !self.store.attach_client_ref(id, prompt) {
            return false;
        }
        if let Some(current) = self.store.get(id) {
            self.record(&current).await;
        }
        true
    }

    /// Loads invoices that were open when the process stopped. Returns how
    /// many were put back into the store.
    pub async fn restore(&self) -> usize {
        let open = match self.journal.load_open().await {
            Ok(open) => open,
            Err(e) => {
                error!("Failed to load open invoices from journal: {}", e);
                return 0;
            }
        };

        let mut restored = 0;
        for invoice in open {
            let id = invoice.id.clone();
            match self.store.restore(invoice) {
                Ok(()) => restored += 1,
                Err(e) => warn!("Skipping journal invoice {}: {}", id, e),
            }
        }

        if restored > 0 {
            info!("Restored {} open invoice(s) from journal", restored);
        }
        restored
    }

    pub(crate) fn authorize(&self, invoice: &Invoice, requester: i64) -> Result<(), PayError> {
        if invoice.user_id == requester || self.config.admin_id == Some(requester) {
            Ok(())
        } else {
            Err(PayError::Forbidden {
                id: invoice.id.clone(),
                requester,
            })
        }
    }

    async fn record(&self, invoice: &Invoice) {
        if let Err(e) = self.journal.record(invoice).await {
            error!("Failed to journal invoice {} ({}): {}", invoice.id, invoice.status, e);
        }
    }

    async fn record_settled(&self, invoice: &Invoice) -> Result<(), JournalError> {
        let mut attempt = 1;
        loop {
            match self.journal.record(invoice).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < SETTLED_RECORD_ATTEMPTS => {
                    warn!(
                        "Journaling settled invoice {} failed (attempt {}): {}",
                        invoice.id, attempt, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// User-facing side of a winning terminal transition.
    async fn finish(&self, invoice: &Invoice, outcome: PaymentOutcome) {
        if let Err(e) = self.notifier.notify_user(invoice.user_id, &outcome).await {
            warn!(
                "Failed to notify user {} about invoice {}: {}",
                invoice.user_id, invoice.id, e
            );
        }
        if let Err(e) = self.notifier.close_messages(invoice).await {
            warn!("Failed to close messages of invoice {}: {}", invoice.id, e);
        }
    }
}

fn log_transition(t: &Transition) {
    info!(
        "Invoice {} (user {}): {} -> {}",
        t.invoice.id, t.invoice.user_id, t.from, t.invoice.status
    );
}

fn store_err(e: StoreError) -> PayError {
    match e {
        StoreError::NotFound(id) => PayError::NotFound(id),
        StoreError::DuplicateActive { user_id, active } => PayError::DuplicateActive { user_id, active },
        // Gateway handed out an id we already track.
        StoreError::AlreadyExists(id) => {
            PayError::GatewayRejected(format!("gateway reused invoice id {}", id))
        }
        StoreError::InvalidTransition { id, from, .. } => {
            PayError::CancelRejected { id, status: from }
        }
    }
}
