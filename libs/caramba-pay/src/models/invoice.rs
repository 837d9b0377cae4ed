use super::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gateway-issued invoice identifier (`pay_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(String);

impl InvoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Created,
    AwaitingPayment,
    Settled,
    Cancelled,
    Expired,
    Failed,
}

impl InvoiceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Settled
                | InvoiceStatus::Cancelled
                | InvoiceStatus::Expired
                | InvoiceStatus::Failed
        )
    }

    /// Edges of the invoice state machine. Terminal states have none.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Created, AwaitingPayment)
                | (Created, Failed)
                | (AwaitingPayment, Settled)
                | (AwaitingPayment, Expired)
                | (AwaitingPayment, Cancelled)
                | (AwaitingPayment, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Created => "created",
            InvoiceStatus::AwaitingPayment => "awaiting_payment",
            InvoiceStatus::Settled => "settled",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Expired => "expired",
            InvoiceStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(InvoiceStatus::Created),
            "awaiting_payment" => Ok(InvoiceStatus::AwaitingPayment),
            "settled" => Ok(InvoiceStatus::Settled),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            "expired" => Ok(InvoiceStatus::Expired),
            "failed" => Ok(InvoiceStatus::Failed),
            other => Err(format!("unknown invoice status: {}", other)),
        }
    }
}

/// What the gateway needs to find the payment again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub pay_id: String,
    pub pay_link: String,
}

/// A sent Telegram message (admin alert, payment prompt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub user_id: i64,
    pub amount: Amount,
    pub context: String,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub external_ref: ExternalRef,
    /// Set together with the move into `Settled`, never cleared.
    pub settled_once: bool,
    /// Admin alert announcing the invoice
    pub alert_ref: Option<MessageRef>,
    /// Payment prompt with the verify/cancel buttons
    pub client_ref: Option<MessageRef>,
}

impl Invoice {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.expires_at <= now
    }
}
