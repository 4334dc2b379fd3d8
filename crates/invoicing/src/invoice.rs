use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{
    Aggregate, AggregateRoot, DomainError, RecordId, TableBacked, TenantId, approx_eq,
};
use procura_events::Event;
use procura_purchasing::PurchaseOrderId;

procura_core::record_id!(
    /// Invoice identifier (tenant-scoped via `tenant_id` fields in events/commands).
    InvoiceId
);

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Paid,
    Cancelled,
}

/// Invoice line (`invoice_items`). Rates are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub line_no: u32,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub discount_rate: f64,
}

impl InvoiceItem {
    pub fn net(&self) -> f64 {
        self.quantity * self.unit_price
    }

    pub fn tax(&self) -> f64 {
        self.net() * self.tax_rate / 100.0
    }

    /// Discount applies to the taxed amount.
    pub fn discount(&self) -> f64 {
        (self.net() + self.tax()) * self.discount_rate / 100.0
    }

    /// `quantity * unit_price * (1 + tax_rate/100) * (1 - discount_rate/100)`.
    pub fn total(&self) -> f64 {
        self.net() * (1.0 + self.tax_rate / 100.0) * (1.0 - self.discount_rate / 100.0)
    }
}

/// Header amounts derived from the items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub discount_amount: f64,
    pub total_amount: f64,
}

impl InvoiceTotals {
    pub fn from_items(items: &[InvoiceItem]) -> Self {
        let subtotal: f64 = items.iter().map(InvoiceItem::net).sum();
        let tax_amount: f64 = items.iter().map(InvoiceItem::tax).sum();
        let discount_amount: f64 = items.iter().map(InvoiceItem::discount).sum();
        Self {
            subtotal,
            tax_amount,
            discount_amount,
            total_amount: subtotal + tax_amount - discount_amount,
        }
    }
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    invoice_number: String,
    vendor_id: Option<RecordId>,
    vendor_name: String,
    purchase_order_id: Option<PurchaseOrderId>,
    invoice_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    notes: Option<String>,
    status: InvoiceStatus,
    items: Vec<InvoiceItem>,
    #[serde(flatten)]
    totals: InvoiceTotals,
    paid_amount: f64,
    rejection_reason: Option<String>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            invoice_number: String::new(),
            vendor_id: None,
            vendor_name: String::new(),
            purchase_order_id: None,
            invoice_date: None,
            due_date: None,
            notes: None,
            status: InvoiceStatus::Draft,
            items: Vec::new(),
            totals: InvoiceTotals::default(),
            paid_amount: 0.0,
            rejection_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn vendor_id(&self) -> Option<RecordId> {
        self.vendor_id
    }

    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    pub fn purchase_order_id(&self) -> Option<PurchaseOrderId> {
        self.purchase_order_id
    }

    pub fn invoice_date(&self) -> Option<NaiveDate> {
        self.invoice_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn totals(&self) -> &InvoiceTotals {
        &self.totals
    }

    pub fn total_amount(&self) -> f64 {
        self.totals.total_amount
    }

    pub fn paid_amount(&self) -> f64 {
        self.paid_amount
    }

    pub fn outstanding_amount(&self) -> f64 {
        (self.totals.total_amount - self.paid_amount).max(0.0)
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Unpaid past its due date and still payable.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !matches!(
            self.status,
            InvoiceStatus::Paid | InvoiceStatus::Cancelled | InvoiceStatus::Rejected
        ) && self.due_date.is_some_and(|due| due < as_of)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TableBacked for Invoice {
    const TABLE: &'static str = "invoices";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// Command: CreateInvoice (header only; items are added while in draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub vendor_id: Option<RecordId>,
    pub vendor_name: String,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateInvoice (draft only). `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub vendor_name: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddInvoiceItem {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub discount_rate: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveInvoiceItem {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegisterPayment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPayment {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: f64,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    UpdateInvoice(UpdateInvoice),
    AddItem(AddInvoiceItem),
    RemoveItem(RemoveInvoiceItem),
    Submit(SubmitInvoice),
    Approve(ApproveInvoice),
    Reject(RejectInvoice),
    RegisterPayment(RegisterPayment),
    Cancel(CancelInvoice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub vendor_id: Option<RecordId>,
    pub vendor_name: String,
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUpdated {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub vendor_name: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItemAdded {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub item: InvoiceItem,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItemRemoved {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSubmitted {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub total_amount: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceApproved. Carries enough context for notification templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceApproved {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub vendor_name: String,
    pub total_amount: f64,
    pub due_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRejected {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRegistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRegistered {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: f64,
    pub new_paid_amount: f64,
    pub fully_paid: bool,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    InvoiceUpdated(InvoiceUpdated),
    InvoiceItemAdded(InvoiceItemAdded),
    InvoiceItemRemoved(InvoiceItemRemoved),
    InvoiceSubmitted(InvoiceSubmitted),
    InvoiceApproved(InvoiceApproved),
    InvoiceRejected(InvoiceRejected),
    PaymentRegistered(PaymentRegistered),
    InvoiceCancelled(InvoiceCancelled),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "invoicing.invoice.created",
            InvoiceEvent::InvoiceUpdated(_) => "invoicing.invoice.updated",
            InvoiceEvent::InvoiceItemAdded(_) => "invoicing.invoice.item_added",
            InvoiceEvent::InvoiceItemRemoved(_) => "invoicing.invoice.item_removed",
            InvoiceEvent::InvoiceSubmitted(_) => "invoicing.invoice.submitted",
            InvoiceEvent::InvoiceApproved(_) => "invoicing.invoice.approved",
            InvoiceEvent::InvoiceRejected(_) => "invoicing.invoice.rejected",
            InvoiceEvent::PaymentRegistered(_) => "invoicing.invoice.payment_registered",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::InvoiceUpdated(e) => e.occurred_at,
            InvoiceEvent::InvoiceItemAdded(e) => e.occurred_at,
            InvoiceEvent::InvoiceItemRemoved(e) => e.occurred_at,
            InvoiceEvent::InvoiceSubmitted(e) => e.occurred_at,
            InvoiceEvent::InvoiceApproved(e) => e.occurred_at,
            InvoiceEvent::InvoiceRejected(e) => e.occurred_at,
            InvoiceEvent::PaymentRegistered(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.invoice_number = e.invoice_number.clone();
                self.vendor_id = e.vendor_id;
                self.vendor_name = e.vendor_name.clone();
                self.purchase_order_id = e.purchase_order_id;
                self.invoice_date = Some(e.invoice_date);
                self.due_date = Some(e.due_date);
                self.notes = e.notes.clone();
                self.items.clear();
                self.totals = InvoiceTotals::default();
                self.paid_amount = 0.0;
                self.status = InvoiceStatus::Draft;
                self.created = true;
            }
            InvoiceEvent::InvoiceUpdated(e) => {
                self.vendor_name = e.vendor_name.clone();
                self.invoice_date = Some(e.invoice_date);
                self.due_date = Some(e.due_date);
                self.notes = e.notes.clone();
            }
            InvoiceEvent::InvoiceItemAdded(e) => {
                self.items.push(e.item.clone());
                self.totals = InvoiceTotals::from_items(&self.items);
            }
            InvoiceEvent::InvoiceItemRemoved(e) => {
                self.items.retain(|i| i.line_no != e.line_no);
                self.totals = InvoiceTotals::from_items(&self.items);
            }
            InvoiceEvent::InvoiceSubmitted(_) => {
                self.status = InvoiceStatus::Submitted;
            }
            InvoiceEvent::InvoiceApproved(_) => {
                self.rejection_reason = None;
                self.status = InvoiceStatus::Approved;
            }
            InvoiceEvent::InvoiceRejected(e) => {
                self.rejection_reason = Some(e.reason.clone());
                self.status = InvoiceStatus::Rejected;
            }
            InvoiceEvent::PaymentRegistered(e) => {
                self.paid_amount = e.new_paid_amount;
                if e.fully_paid {
                    self.status = InvoiceStatus::Paid;
                }
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                self.status = InvoiceStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::UpdateInvoice(cmd) => self.handle_update(cmd),
            InvoiceCommand::AddItem(cmd) => self.handle_add_item(cmd),
            InvoiceCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            InvoiceCommand::Submit(cmd) => self.handle_submit(cmd),
            InvoiceCommand::Approve(cmd) => self.handle_approve(cmd),
            InvoiceCommand::Reject(cmd) => self.handle_reject(cmd),
            InvoiceCommand::RegisterPayment(cmd) => self.handle_register_payment(cmd),
            InvoiceCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Invoice {
    fn ensure_existing(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: InvoiceStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(format!(
                "cannot {action} an invoice in status {:?}",
                self.status
            )));
        }
        Ok(())
    }

    fn check_dates(invoice_date: NaiveDate, due_date: NaiveDate) -> Result<(), DomainError> {
        if due_date < invoice_date {
            return Err(DomainError::validation("due_date cannot be before invoice_date"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        DomainError::require_text("invoice_number", &cmd.invoice_number)?;
        DomainError::require_text("vendor_name", &cmd.vendor_name)?;
        Self::check_dates(cmd.invoice_date, cmd.due_date)?;

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            invoice_number: cmd.invoice_number.trim().to_string(),
            vendor_id: cmd.vendor_id,
            vendor_name: cmd.vendor_name.trim().to_string(),
            purchase_order_id: cmd.purchase_order_id,
            invoice_date: cmd.invoice_date,
            due_date: cmd.due_date,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;
        self.ensure_status(InvoiceStatus::Draft, "edit")?;

        let vendor_name = cmd.vendor_name.clone().unwrap_or_else(|| self.vendor_name.clone());
        DomainError::require_text("vendor_name", &vendor_name)?;
        let (Some(current_invoice_date), Some(current_due_date)) = (self.invoice_date, self.due_date) else {
            return Err(DomainError::invariant("invoice dates are missing"));
        };
        let invoice_date = cmd.invoice_date.unwrap_or(current_invoice_date);
        let due_date = cmd.due_date.unwrap_or(current_due_date);
        Self::check_dates(invoice_date, due_date)?;

        Ok(vec![InvoiceEvent::InvoiceUpdated(InvoiceUpdated {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            vendor_name: vendor_name.trim().to_string(),
            invoice_date,
            due_date,
            notes: cmd.notes.clone().or_else(|| self.notes.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddInvoiceItem) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;
        self.ensure_status(InvoiceStatus::Draft, "modify items of")?;

        DomainError::require_text("description", &cmd.description)?;
        if !cmd.quantity.is_finite() || cmd.quantity <= 0.0 {
            return Err(DomainError::validation(
                "invoice item quantity must be positive",
            ));
        }
        DomainError::require_non_negative("unit_price", cmd.unit_price)?;
        DomainError::require_percentage("tax_rate", cmd.tax_rate)?;
        DomainError::require_percentage("discount_rate", cmd.discount_rate)?;

        let line_no = self.items.iter().map(|i| i.line_no).max().unwrap_or(0) + 1;
        Ok(vec![InvoiceEvent::InvoiceItemAdded(InvoiceItemAdded {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            item: InvoiceItem {
                line_no,
                description: cmd.description.trim().to_string(),
                quantity: cmd.quantity,
                unit_price: cmd.unit_price,
                tax_rate: cmd.tax_rate,
                discount_rate: cmd.discount_rate,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveInvoiceItem) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;
        self.ensure_status(InvoiceStatus::Draft, "modify items of")?;

        if !self.items.iter().any(|i| i.line_no == cmd.line_no) {
            return Err(DomainError::not_found());
        }

        Ok(vec![InvoiceEvent::InvoiceItemRemoved(InvoiceItemRemoved {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;
        self.ensure_status(InvoiceStatus::Draft, "submit")?;

        if self.items.is_empty() {
            return Err(DomainError::validation(
                "cannot submit invoice without items",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceSubmitted(InvoiceSubmitted {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            total_amount: self.totals.total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;
        self.ensure_status(InvoiceStatus::Submitted, "approve")?;

        Ok(vec![InvoiceEvent::InvoiceApproved(InvoiceApproved {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            invoice_number: self.invoice_number.clone(),
            vendor_name: self.vendor_name.clone(),
            total_amount: self.totals.total_amount,
            due_date: self.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;
        self.ensure_status(InvoiceStatus::Submitted, "reject")?;
        DomainError::require_text("reason", &cmd.reason)?;

        Ok(vec![InvoiceEvent::InvoiceRejected(InvoiceRejected {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_payment(
        &self,
        cmd: &RegisterPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;

        if self.status != InvoiceStatus::Approved {
            return Err(DomainError::invariant(
                "payments can only be registered on approved invoices",
            ));
        }

        if !cmd.amount.is_finite() || cmd.amount <= 0.0 {
            return Err(DomainError::validation(
                "payment amount must be positive",
            ));
        }

        let new_paid_amount = self.paid_amount + cmd.amount;
        let total = self.totals.total_amount;
        let fully_paid = approx_eq(new_paid_amount, total);
        if new_paid_amount > total && !fully_paid {
            return Err(DomainError::invariant("cannot overpay invoice"));
        }

        Ok(vec![InvoiceEvent::PaymentRegistered(PaymentRegistered {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            amount: cmd.amount,
            new_paid_amount: if fully_paid { total } else { new_paid_amount },
            fully_paid,
            reference: cmd.reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;

        if !matches!(
            self.status,
            InvoiceStatus::Draft | InvoiceStatus::Submitted | InvoiceStatus::Approved
        ) {
            return Err(DomainError::invariant(format!(
                "cannot cancel an invoice in status {:?}",
                self.status
            )));
        }
        if self.paid_amount > 0.0 {
            return Err(DomainError::invariant(
                "cannot cancel an invoice with registered payments",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Items as `(quantity, unit_price, tax_rate, discount_rate)`.
#[cfg(test)]
pub(crate) fn test_invoice(
    tenant_id: TenantId,
    due_date: NaiveDate,
    items: &[(f64, f64, f64, f64)],
) -> Invoice {
    let invoice_id = InvoiceId::generate();
    let mut invoice = Invoice::empty(invoice_id);
    let mut commands = vec![InvoiceCommand::CreateInvoice(CreateInvoice {
        tenant_id,
        invoice_id,
        invoice_number: "INV-1001".to_string(),
        vendor_id: None,
        vendor_name: "Acme Supplies".to_string(),
        purchase_order_id: None,
        invoice_date: due_date - chrono::Duration::days(30),
        due_date,
        notes: None,
        occurred_at: Utc::now(),
    })];
    for (quantity, unit_price, tax_rate, discount_rate) in items {
        commands.push(InvoiceCommand::AddItem(AddInvoiceItem {
            tenant_id,
            invoice_id,
            description: "Consulting".to_string(),
            quantity: *quantity,
            unit_price: *unit_price,
            tax_rate: *tax_rate,
            discount_rate: *discount_rate,
            occurred_at: Utc::now(),
        }));
    }
    for command in commands {
        for event in invoice.handle(&command).unwrap() {
            invoice.apply(&event);
        }
    }
    invoice
}

#[cfg(test)]
pub(crate) fn advance(invoice: &mut Invoice, command: InvoiceCommand) -> Result<(), DomainError> {
    for event in invoice.handle(&command)? {
        invoice.apply(&event);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn submit_and_approve(invoice: &mut Invoice, tenant_id: TenantId) {
    let invoice_id = invoice.id_typed();
    advance(invoice, InvoiceCommand::Submit(SubmitInvoice { tenant_id, invoice_id, occurred_at: Utc::now() })).unwrap();
    advance(invoice, InvoiceCommand::Approve(ApproveInvoice { tenant_id, invoice_id, occurred_at: Utc::now() })).unwrap();
}
