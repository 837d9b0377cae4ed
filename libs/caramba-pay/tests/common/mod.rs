#![allow(dead_code)]

use async_trait::async_trait;
use caramba_pay::error::{GatewayError, JournalError};
use caramba_pay::gateway::{InvoiceHandle, PaymentGateway};
use caramba_pay::models::{
    Amount, ExternalRef, Invoice, InvoiceId, InvoiceStatus, MessageRef, PaymentMethod, PaymentOutcome, PaymentState,
};
use caramba_pay::repositories::{InvoiceJournal, MemoryJournal, NoopJournal};
use caramba_pay::{InvoiceStore, LifecycleConfig, LifecycleManager, NotificationDispatcher, ReconciliationReceiver, SettlementSink};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ADMIN_ID: i64 = 999;

#[derive(Default)]
pub struct FakeGateway {
    next_id: AtomicU64,
    fail_next: AtomicBool,
    delay_ms: AtomicU64,
    states: Mutex<HashMap<String, PaymentState>>,
    pub create_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_state(&self, id: &InvoiceId, state: PaymentState) {
        self.states.lock().unwrap().insert(id.as_str().to_string(), state);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_invoice(&self, user_id: i64, _amount: Amount, _context: &str) -> Result<InvoiceHandle, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Unreachable("connection refused".into()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let pay_id = format!("PAY{}_{}", user_id, n);
        self.states.lock().unwrap().insert(pay_id.clone(), PaymentState::Pending);
        Ok(InvoiceHandle {
            pay_link: format!("upi://pay?pa=merchant@upi&tr={}", pay_id),
            pay_id,
            gateway_expiry: None,
        })
    }

    async fn check_status(&self, external_ref: &ExternalRef) -> Result<PaymentState, GatewayError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(&external_ref.pay_id)
            .copied()
            .unwrap_or(PaymentState::NotFound))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct CountingSink {
    pub calls: Mutex<Vec<(i64, Amount, String)>>,
    pub fail: AtomicBool,
}

impl CountingSink {
    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SettlementSink for CountingSink {
    async fn apply(&self, user_id: i64, amount: Amount, context: &str) -> anyhow::Result<()> {
        // Widen the race window between concurrent settlers.
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push((user_id, amount, context.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("panel offline");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub admin_alerts: Mutex<Vec<InvoiceId>>,
    pub user_outcomes: Mutex<Vec<(i64, PaymentOutcome)>>,
    pub closed: Mutex<Vec<Invoice>>,
    pub fail_admin: AtomicBool,
}

impl RecordingNotifier {
    pub fn outcomes(&self) -> Vec<(i64, PaymentOutcome)> {
        self.user_outcomes.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<Invoice> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify_admin(
        &self,
        _user_id: i64,
        _amount: Amount,
        _method: PaymentMethod,
        invoice_id: &InvoiceId,
        _context: &str,
    ) -> anyhow::Result<MessageRef> {
        if self.fail_admin.load(Ordering::SeqCst) {
            anyhow::bail!("telegram down");
        }
        let mut alerts = self.admin_alerts.lock().unwrap();
        alerts.push(invoice_id.clone());
        Ok(MessageRef {
            chat_id: ADMIN_ID,
            message_id: alerts.len() as i32,
        })
    }

    async fn notify_user(&self, user_id: i64, outcome: &PaymentOutcome) -> anyhow::Result<()> {
        self.user_outcomes.lock().unwrap().push((user_id, outcome.clone()));
        Ok(())
    }

    async fn close_messages(&self, invoice: &Invoice) -> anyhow::Result<()> {
        self.closed.lock().unwrap().push(invoice.clone());
        Ok(())
    }
}

/// Memory journal whose `Settled` writes fail while `settled_failures` is above zero.
pub struct SettleFailingJournal {
    pub inner: Arc<MemoryJournal>,
    pub settled_failures: AtomicUsize,
    pub settled_attempts: AtomicUsize,
}

impl SettleFailingJournal {
    pub fn new(inner: Arc<MemoryJournal>, settled_failures: usize) -> Self {
        Self {
            inner,
            settled_failures: AtomicUsize::new(settled_failures),
            settled_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InvoiceJournal for SettleFailingJournal {
    async fn record(&self, invoice: &Invoice) -> Result<(), JournalError> {
        if invoice.status == InvoiceStatus::Settled {
            self.settled_attempts.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .settled_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(JournalError::Corrupt {
                    id: invoice.id.to_string(),
                    reason: "disk full".into(),
                });
            }
        }
        self.inner.record(invoice).await
    }

    async fn load_open(&self) -> Result<Vec<Invoice>, JournalError> {
        self.inner.load_open().await
    }
}

pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub sink: Arc<CountingSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub journal: Arc<dyn InvoiceJournal>,
    pub manager: LifecycleManager,
    pub receiver: ReconciliationReceiver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_journal(Arc::new(NoopJournal))
    }

    pub fn with_memory_journal() -> (Self, Arc<MemoryJournal>) {
        let journal = Arc::new(MemoryJournal::new());
        (Self::with_journal(journal.clone()), journal)
    }

    pub fn with_journal(journal: Arc<dyn InvoiceJournal>) -> Self {
        Self::build(Arc::new(FakeGateway::default()), journal)
    }

    pub fn build(gateway: Arc<FakeGateway>, journal: Arc<dyn InvoiceJournal>) -> Self {
        let sink = Arc::new(CountingSink::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = LifecycleManager::new(
            InvoiceStore::new(),
            gateway.clone(),
            sink.clone(),
            notifier.clone(),
            journal.clone(),
            LifecycleConfig {
                ttl: Duration::minutes(10),
                admin_id: Some(ADMIN_ID),
            },
        );
        let receiver = ReconciliationReceiver::new(manager.clone());
        Self {
            gateway,
            sink,
            notifier,
            journal,
            manager,
            receiver,
        }
    }
}

pub fn amount(major: i64) -> Amount {
    Amount::from_major(major).unwrap()
}
