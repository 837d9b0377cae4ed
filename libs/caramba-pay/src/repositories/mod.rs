pub mod invoice_repo;

pub use invoice_repo::{InvoiceJournal, MemoryJournal, NoopJournal, PgInvoiceJournal};
