pub mod db;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod models;
pub mod ports;
pub mod reconcile;
pub mod repositories;
pub mod store;

pub use sqlx;

pub use error::{GatewayError, JournalError, PayError, StoreError};
pub use gateway::{GatewayConfig, InvoiceHandle, OddusGateway, PaymentGateway};
pub use lifecycle::{CreatedInvoice, LifecycleConfig, LifecycleManager, SettleOutcome};
pub use ports::{NotificationDispatcher, SettlementSink};
pub use reconcile::{ReconcileOutcome, ReconciliationReceiver, WebhookNotice};
pub use store::InvoiceStore;
