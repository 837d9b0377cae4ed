//! Error types for the invoice lifecycle

use crate::models::{InvoiceId, InvoiceStatus};
use thiserror::Error;

/// Failures talking to the payment gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure or timeout; nothing usable came back
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    /// Gateway answered but refused or returned something unusable
    #[error("gateway rejected request: {0}")]
    Rejected(String),
}

/// Failures inside the invoice store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invoice not found: {0}")]
    NotFound(InvoiceId),

    #[error("invalid transition for invoice {id}: {from} -> {to}")]
    InvalidTransition {
        id: InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// `active` is `None` while the holder is still waiting on the gateway
    #[error("user {user_id} already has an active invoice")]
    DuplicateActive {
        user_id: i64,
        active: Option<InvoiceId>,
    },

    #[error("invoice already exists: {0}")]
    AlreadyExists(InvoiceId),
}

/// Errors surfaced by the lifecycle manager and reconciliation receiver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayError {
    #[error("user {user_id} already has an active invoice")]
    DuplicateActive {
        user_id: i64,
        active: Option<InvoiceId>,
    },

    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),

    #[error("gateway rejected request: {0}")]
    GatewayRejected(String),

    #[error("invoice not found: {0}")]
    NotFound(InvoiceId),

    #[error("invoice {id} cannot be cancelled in state {status}")]
    CancelRejected { id: InvoiceId, status: InvoiceStatus },

    #[error("user {requester} may not act on invoice {id}")]
    Forbidden { id: InvoiceId, requester: i64 },
}

impl From<GatewayError> for PayError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unreachable(msg) => PayError::GatewayUnreachable(msg),
            GatewayError::Rejected(msg) => PayError::GatewayRejected(msg),
        }
    }
}

impl PayError {
    /// Whether the user can fix this by trying again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PayError::DuplicateActive { .. }
                | PayError::GatewayUnreachable(_)
                | PayError::GatewayRejected(_)
        )
    }
}

/// Failures of the durable invoice journal.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt journal row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}
