use crate::error::GatewayError;
use crate::models::{Amount, ExternalRef, PaymentState};
use async_trait::async_trait;
use std::time::Duration;

pub mod oddus;

pub use oddus::OddusGateway;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// What the gateway hands back for a freshly created invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHandle {
    pub pay_id: String,
    pub pay_link: String,
    /// Gateway's own expiry string, informational only
    pub gateway_expiry: Option<String>,
}

impl InvoiceHandle {
    pub fn external_ref(&self) -> ExternalRef {
        ExternalRef {
            pay_id: self.pay_id.clone(),
            pay_link: self.pay_link.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub client_id: String,
    /// Where the gateway pushes completion notices
    pub notification_url: String,
    pub timeout: Duration,
}

/// Sole boundary to the external payment API. Implementations never retry
/// and never mutate local state, so any call is safe to repeat.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(
        &self,
        user_id: i64,
        amount: Amount,
        context: &str,
    ) -> Result<InvoiceHandle, GatewayError>;

    async fn check_status(&self, external_ref: &ExternalRef) -> Result<PaymentState, GatewayError>;

    fn name(&self) -> &str;
}
