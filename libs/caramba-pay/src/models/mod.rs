pub mod amount;
pub mod invoice;
pub mod payment;

pub use amount::{Amount, AmountError};
pub use invoice::{ExternalRef, Invoice, InvoiceId, InvoiceStatus, MessageRef};
pub use payment::{PaymentMethod, PaymentOutcome, PaymentState};
