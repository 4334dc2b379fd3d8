//! Invoicing domain module (vendor invoices and payables).
//!
//! This crate contains business rules for supplier invoices, their item
//! arithmetic and the dashboard statistics, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod invoice;
pub mod stats;

pub use invoice::{
    AddInvoiceItem, ApproveInvoice, CancelInvoice, CreateInvoice, Invoice, InvoiceCommand,
    InvoiceEvent, InvoiceId, InvoiceItem, InvoiceStatus, InvoiceTotals, RegisterPayment,
    RejectInvoice, RemoveInvoiceItem, SubmitInvoice, UpdateInvoice,
};
pub use stats::{InvoiceStats, invoice_stats};
