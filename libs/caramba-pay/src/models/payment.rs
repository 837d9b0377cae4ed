use super::amount::Amount;
use super::invoice::InvoiceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway view of a payment, as reported by a status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    Pending,
    Paid,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Upi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Upi => "upi",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Upi => "UPI",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upi" => Some(PaymentMethod::Upi),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal result delivered to the paying user, once per invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Settled { invoice_id: InvoiceId, amount: Amount, context: String },
    Cancelled { invoice_id: InvoiceId },
    Expired { invoice_id: InvoiceId },
    Failed { invoice_id: InvoiceId },
}

impl PaymentOutcome {
    pub fn invoice_id(&self) -> &InvoiceId {
        match self {
            PaymentOutcome::Settled { invoice_id, .. }
            | PaymentOutcome::Cancelled { invoice_id }
            | PaymentOutcome::Expired { invoice_id }
            | PaymentOutcome::Failed { invoice_id } => invoice_id,
        }
    }
}
