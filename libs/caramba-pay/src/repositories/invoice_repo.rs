use crate::error::JournalError;
use crate::models::{Amount, ExternalRef, Invoice, InvoiceId, InvoiceStatus, MessageRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;

/// Durable record of invoices, written through by the lifecycle manager.
///
/// `record` is an upsert that never overwrites a terminal row.
#[async_trait]
pub trait InvoiceJournal: Send + Sync {
    async fn record(&self, invoice: &Invoice) -> Result<(), JournalError>;

    /// Invoices that were still open when the process last stopped.
    async fn load_open(&self) -> Result<Vec<Invoice>, JournalError>;
}

#[derive(Debug, Clone)]
pub struct PgInvoiceJournal {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    user_id: i64,
    amount_minor: i64,
    context: String,
    status: String,
    pay_link: String,
    settled_once: bool,
    alert_chat_id: Option<i64>,
    alert_message_id: Option<i32>,
    client_chat_id: Option<i64>,
    client_message_id: Option<i32>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = JournalError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| JournalError::Corrupt {
            id: row.id.clone(),
            reason,
        };
        let status: InvoiceStatus = row.status.parse().map_err(corrupt)?;
        let amount = Amount::from_minor(row.amount_minor).map_err(|e| corrupt(e.to_string()))?;
        let alert_ref = message_ref(row.alert_chat_id, row.alert_message_id);
        let client_ref = message_ref(row.client_chat_id, row.client_message_id);

        Ok(Invoice {
            external_ref: ExternalRef {
                pay_id: row.id.clone(),
                pay_link: row.pay_link,
            },
            id: InvoiceId::new(row.id),
            user_id: row.user_id,
            amount,
            context: row.context,
            status,
            created_at: row.created_at,
            expires_at: row.expires_at,
            updated_at: row.updated_at,
            settled_once: row.settled_once,
            alert_ref,
            client_ref,
        })
    }
}

fn message_ref(chat_id: Option<i64>, message_id: Option<i32>) -> Option<MessageRef> {
    match (chat_id, message_id) {
        (Some(chat_id), Some(message_id)) => Some(MessageRef { chat_id, message_id }),
        _ => None,
    }
}

impl PgInvoiceJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceJournal for PgInvoiceJournal {
    async fn record(&self, invoice: &Invoice) -> Result<(), JournalError> {
        sqlx::query(
            "INSERT INTO upi_invoices
                (id, user_id, amount_minor, context, status, pay_link, settled_once,
                 alert_chat_id, alert_message_id, client_chat_id, client_message_id,
                 created_at, expires_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                settled_once = upi_invoices.settled_once OR EXCLUDED.settled_once,
                alert_chat_id = COALESCE(EXCLUDED.alert_chat_id, upi_invoices.alert_chat_id),
                alert_message_id = COALESCE(EXCLUDED.alert_message_id, upi_invoices.alert_message_id),
                client_chat_id = COALESCE(EXCLUDED.client_chat_id, upi_invoices.client_chat_id),
                client_message_id = COALESCE(EXCLUDED.client_message_id, upi_invoices.client_message_id),
                updated_at = EXCLUDED.updated_at
             WHERE upi_invoices.status IN ('created', 'awaiting_payment')",
        )
        .bind(invoice.id.as_str())
        .bind(invoice.user_id)
        .bind(invoice.amount.minor())
        .bind(&invoice.context)
        .bind(invoice.status.as_str())
        .bind(&invoice.external_ref.pay_link)
        .bind(invoice.settled_once)
        .bind(invoice.alert_ref.map(|r| r.chat_id))
        .bind(invoice.alert_ref.map(|r| r.message_id))
        .bind(invoice.client_ref.map(|r| r.chat_id))
        .bind(invoice.client_ref.map(|r| r.message_id))
        .bind(invoice.created_at)
        .bind(invoice.expires_at)
        .bind(invoice.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_open(&self) -> Result<Vec<Invoice>, JournalError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            "SELECT id, user_id, amount_minor, context, status, pay_link, settled_once,
                    alert_chat_id, alert_message_id, client_chat_id, client_message_id,
                    created_at, expires_at, updated_at
             FROM upi_invoices
             WHERE status IN ('created', 'awaiting_payment')
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Invoice::try_from).collect()
    }
}

/// Journal kept in process memory. Survives a rebuilt store, not a restart.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    rows: Mutex<HashMap<InvoiceId, Invoice>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &InvoiceId) -> Option<Invoice> {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl InvoiceJournal for MemoryJournal {
    async fn record(&self, invoice: &Invoice) -> Result<(), JournalError> {
        let mut rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match rows.get(&invoice.id) {
            Some(existing) if existing.status.is_terminal() => {}
            _ => {
                rows.insert(invoice.id.clone(), invoice.clone());
            }
        }
        Ok(())
    }

    async fn load_open(&self) -> Result<Vec<Invoice>, JournalError> {
        let rows = self.rows.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut open: Vec<Invoice> = rows
            .values()
            .filter(|inv| !inv.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by_key(|inv| inv.created_at);
        Ok(open)
    }
}

/// For deployments without a database: in-flight invoices die with the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJournal;

#[async_trait]
impl InvoiceJournal for NoopJournal {
    async fn record(&self, _invoice: &Invoice) -> Result<(), JournalError> {
        Ok(())
    }

    async fn load_open(&self) -> Result<Vec<Invoice>, JournalError> {
        Ok(Vec::new())
    }
}
