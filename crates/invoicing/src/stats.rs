use chrono::NaiveDate;
use serde::Serialize;

use crate::invoice::{Invoice, InvoiceStatus};

/// Payables dashboard figures as of one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceStats {
    pub as_of: Option<NaiveDate>,
    pub total_count: usize,
    pub draft_count: usize,
    pub submitted_count: usize,
    pub approved_count: usize,
    pub rejected_count: usize,
    pub paid_count: usize,
    pub cancelled_count: usize,
    /// Σ total of submitted, approved and paid invoices.
    pub total_billed: f64,
    pub total_paid: f64,
    /// Unpaid remainder of submitted and approved invoices.
    pub outstanding: f64,
    pub overdue_count: usize,
    pub overdue_amount: f64,
}

pub fn invoice_stats(invoices: &[Invoice], as_of: NaiveDate) -> InvoiceStats {
    let mut stats = InvoiceStats {
        as_of: Some(as_of),
        ..InvoiceStats::default()
    };

    for invoice in invoices {
        stats.total_count += 1;
        match invoice.status() {
            InvoiceStatus::Draft => stats.draft_count += 1,
            InvoiceStatus::Submitted => stats.submitted_count += 1,
            InvoiceStatus::Approved => stats.approved_count += 1,
            InvoiceStatus::Rejected => stats.rejected_count += 1,
            InvoiceStatus::Paid => stats.paid_count += 1,
            InvoiceStatus::Cancelled => stats.cancelled_count += 1,
        }

        if matches!(
            invoice.status(),
            InvoiceStatus::Submitted | InvoiceStatus::Approved | InvoiceStatus::Paid
        ) {
            stats.total_billed += invoice.total_amount();
        }
        stats.total_paid += invoice.paid_amount();
        if matches!(invoice.status(), InvoiceStatus::Submitted | InvoiceStatus::Approved) {
            stats.outstanding += invoice.outstanding_amount();
        }
        if invoice.is_overdue(as_of) {
            stats.overdue_count += 1;
            stats.overdue_amount += invoice.outstanding_amount();
        }
    }

    stats
}
