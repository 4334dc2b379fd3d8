use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateRoot, DomainError, RecordId, TableBacked, TenantId};
use procura_events::Event;
use procura_requests::RequestId;

procura_core::record_id!(
    /// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
    PurchaseOrderId
);

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
    Received,
    Closed,
    Cancelled,
}

/// Purchase order line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Percentage, `0..=100`.
    #[serde(default)]
    pub tax_rate: f64,
}

impl OrderLine {
    pub fn net(&self) -> f64 {
        self.quantity * self.unit_price
    }

    pub fn tax(&self) -> f64 {
        self.net() * self.tax_rate / 100.0
    }

    pub fn total(&self) -> f64 {
        self.net() + self.tax()
    }
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    po_number: String,
    vendor_id: Option<RecordId>,
    vendor_name: String,
    request_id: Option<RequestId>,
    expected_delivery: Option<NaiveDate>,
    notes: Option<String>,
    status: PurchaseOrderStatus,
    lines: Vec<OrderLine>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            po_number: String::new(),
            vendor_id: None,
            vendor_name: String::new(),
            request_id: None,
            expected_delivery: None,
            notes: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn vendor_id(&self) -> Option<RecordId> {
        self.vendor_id
    }

    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    pub fn expected_delivery(&self) -> Option<NaiveDate> {
        self.expected_delivery
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> f64 {
        self.lines.iter().map(OrderLine::net).sum()
    }

    pub fn tax_amount(&self) -> f64 {
        self.lines.iter().map(OrderLine::tax).sum()
    }

    pub fn total_amount(&self) -> f64 {
        self.lines.iter().map(OrderLine::total).sum()
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TableBacked for PurchaseOrder {
    const TABLE: &'static str = "purchase_orders";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// Command: CreatePurchaseOrder. `po_number` comes from
/// [`crate::StandardPoSettings::allocate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub vendor_id: Option<RecordId>,
    pub vendor_name: String,
    pub request_id: Option<RequestId>,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveGoods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    Approve(Approve),
    ReceiveGoods(ReceiveGoods),
    Close(ClosePurchaseOrder),
    Cancel(CancelPurchaseOrder),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub vendor_id: Option<RecordId>,
    pub vendor_name: String,
    pub request_id: Option<RequestId>,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderApproved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderApproved {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub vendor_name: String,
    pub total_amount: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderLineAdded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLineAdded {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line: OrderLine,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLineRemoved {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// All lines are received in one delivery; partial receipts are not tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderClosed {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCancelled {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderLineAdded(PurchaseOrderLineAdded),
    PurchaseOrderLineRemoved(PurchaseOrderLineRemoved),
    PurchaseOrderApproved(PurchaseOrderApproved),
    GoodsReceived(GoodsReceived),
    PurchaseOrderClosed(PurchaseOrderClosed),
    PurchaseOrderCancelled(PurchaseOrderCancelled),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderLineAdded(_) => "purchasing.order.line_added",
            PurchaseOrderEvent::PurchaseOrderLineRemoved(_) => "purchasing.order.line_removed",
            PurchaseOrderEvent::PurchaseOrderApproved(_) => "purchasing.order.approved",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            PurchaseOrderEvent::PurchaseOrderClosed(_) => "purchasing.order.closed",
            PurchaseOrderEvent::PurchaseOrderCancelled(_) => "purchasing.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderLineRemoved(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderApproved(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderClosed(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.po_number = e.po_number.clone();
                self.vendor_id = e.vendor_id;
                self.vendor_name = e.vendor_name.clone();
                self.request_id = e.request_id;
                self.expected_delivery = e.expected_delivery;
                self.notes = e.notes.clone();
                self.status = PurchaseOrderStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderLineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            PurchaseOrderEvent::PurchaseOrderLineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            PurchaseOrderEvent::PurchaseOrderApproved(_) => {
                self.status = PurchaseOrderStatus::Approved;
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                self.lines = e.lines.clone();
                self.status = PurchaseOrderStatus::Received;
            }
            PurchaseOrderEvent::PurchaseOrderClosed(_) => {
                self.status = PurchaseOrderStatus::Closed;
            }
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => {
                self.cancel_reason = e.reason.clone();
                self.status = PurchaseOrderStatus::Cancelled;
            }
        }

        // +1 per applied event; doubles as the row's optimistic concurrency token.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            PurchaseOrderCommand::Approve(cmd) => self.handle_approve(cmd),
            PurchaseOrderCommand::ReceiveGoods(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::Close(cmd) => self.handle_close(cmd),
            PurchaseOrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_existing(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "cannot modify purchase order once approved",
            ));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        DomainError::require_text("po_number", &cmd.po_number)?;
        DomainError::require_text("vendor_name", &cmd.vendor_name)?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                po_number: cmd.po_number.clone(),
                vendor_id: cmd.vendor_id,
                vendor_name: cmd.vendor_name.trim().to_string(),
                request_id: cmd.request_id,
                expected_delivery: cmd.expected_delivery,
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.ensure_draft()?;

        DomainError::require_text("description", &cmd.description)?;
        if !cmd.quantity.is_finite() || cmd.quantity <= 0.0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        DomainError::require_non_negative("unit_price", cmd.unit_price)?;
        DomainError::require_percentage("tax_rate", cmd.tax_rate)?;

        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        Ok(vec![PurchaseOrderEvent::PurchaseOrderLineAdded(
            PurchaseOrderLineAdded {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                line: OrderLine {
                    line_no,
                    description: cmd.description.trim().to_string(),
                    quantity: cmd.quantity,
                    unit_price: cmd.unit_price,
                    tax_rate: cmd.tax_rate,
                },
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        self.ensure_draft()?;

        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::not_found());
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderLineRemoved(
            PurchaseOrderLineRemoved {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                line_no: cmd.line_no,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "only draft purchase orders can be approved",
            ));
        }

        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot approve purchase order without lines",
            ));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderApproved(
            PurchaseOrderApproved {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                po_number: self.po_number.clone(),
                vendor_name: self.vendor_name.clone(),
                total_amount: self.total_amount(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_receive(
        &self,
        cmd: &ReceiveGoods,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Approved {
            return Err(DomainError::invariant(
                "cannot receive goods before purchase order is approved",
            ));
        }

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            lines: self.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &ClosePurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Received {
            return Err(DomainError::invariant(
                "only received purchase orders can be closed",
            ));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderClosed(PurchaseOrderClosed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if !matches!(
            self.status,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Approved
        ) {
            return Err(DomainError::invariant(
                "only draft or approved purchase orders can be cancelled",
            ));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCancelled(
            PurchaseOrderCancelled {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                reason: cmd.reason.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_order(tenant_id: TenantId) -> PurchaseOrder {
        let order_id = PurchaseOrderId::generate();
        let mut order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                tenant_id,
                order_id,
                po_number: "PO-2026-0001".to_string(),
                vendor_id: Some(RecordId::new()),
                vendor_name: "Acme Supplies".to_string(),
                request_id: None,
                expected_delivery: None,
                notes: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    fn add_line(order: &mut PurchaseOrder, tenant_id: TenantId, quantity: f64, unit_price: f64, tax_rate: f64) {
        let events = order
            .handle(&PurchaseOrderCommand::AddLine(AddLine {
                tenant_id,
                order_id: order.id_typed(),
                description: "Toner".to_string(),
                quantity,
                unit_price,
                tax_rate,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
    }

    fn approve(order: &mut PurchaseOrder, tenant_id: TenantId) -> Result<PurchaseOrderEvent, DomainError> {
        let events = order.handle(&PurchaseOrderCommand::Approve(Approve {
            tenant_id,
            order_id: order.id_typed(),
            occurred_at: test_time(),
        }))?;
        order.apply(&events[0]);
        Ok(events[0].clone())
    }

    #[test]
    fn create_purchase_order_emits_purchase_order_created_event() {
        let tenant_id = TenantId::new();
        let order = created_order(tenant_id);
        assert_eq!(order.status(), PurchaseOrderStatus::Draft);
        assert_eq!(order.po_number(), "PO-2026-0001");
        assert_eq!(order.vendor_name(), "Acme Supplies");
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn approve_requires_lines_and_carries_total() {
        let tenant_id = TenantId::new();
        let mut order = created_order(tenant_id);

        let err = approve(&mut order, tenant_id).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        add_line(&mut order, tenant_id, 10.0, 25.0, 10.0);
        add_line(&mut order, tenant_id, 2.0, 100.0, 0.0);
        assert_eq!(order.subtotal(), 450.0);
        assert_eq!(order.tax_amount(), 25.0);

        match approve(&mut order, tenant_id).unwrap() {
            PurchaseOrderEvent::PurchaseOrderApproved(e) => {
                assert_eq!(e.total_amount, 475.0);
                assert_eq!(e.po_number, "PO-2026-0001");
            }
            other => panic!("Expected PurchaseOrderApproved, got {other:?}"),
        }
        assert_eq!(order.status(), PurchaseOrderStatus::Approved);
    }

    #[test]
    fn cannot_receive_before_approval() {
        let tenant_id = TenantId::new();
        let mut order = created_order(tenant_id);
        add_line(&mut order, tenant_id, 1.0, 1.0, 0.0);

        let err = order
            .handle(&PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                tenant_id,
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg)
                if msg.contains("cannot receive goods before purchase order is approved") => {}
            _ => panic!("Expected InvariantViolation for receiving before approval"),
        }
    }

    #[test]
    fn receive_then_close() {
        let tenant_id = TenantId::new();
        let mut order = created_order(tenant_id);
        add_line(&mut order, tenant_id, 3.0, 9.5, 5.0);
        approve(&mut order, tenant_id).unwrap();

        let order_id = order.id_typed();
        for command in [
            PurchaseOrderCommand::ReceiveGoods(ReceiveGoods { tenant_id, order_id, occurred_at: test_time() }),
            PurchaseOrderCommand::Close(ClosePurchaseOrder { tenant_id, order_id, occurred_at: test_time() }),
        ] {
            let events = order.handle(&command).unwrap();
            order.apply(&events[0]);
        }
        assert_eq!(order.status(), PurchaseOrderStatus::Closed);

        let err = order
            .handle(&PurchaseOrderCommand::Cancel(CancelPurchaseOrder {
                tenant_id,
                order_id,
                reason: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn lines_are_frozen_after_approval() {
        let tenant_id = TenantId::new();
        let mut order = created_order(tenant_id);
        add_line(&mut order, tenant_id, 1.0, 1.0, 0.0);
        approve(&mut order, tenant_id).unwrap();

        let err = order
            .handle(&PurchaseOrderCommand::RemoveLine(RemoveLine {
                tenant_id,
                order_id: order.id_typed(),
                line_no: 1,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn tax_rate_over_100_is_rejected() {
        let tenant_id = TenantId::new();
        let order = created_order(tenant_id);
        let err = order
            .handle(&PurchaseOrderCommand::AddLine(AddLine {
                tenant_id,
                order_id: order.id_typed(),
                description: "Paper".to_string(),
                quantity: 1.0,
                unit_price: 5.0,
                tax_rate: 120.0,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn other_tenant_cannot_touch_order() {
        let order = created_order(TenantId::new());
        let err = order
            .handle(&PurchaseOrderCommand::Approve(Approve {
                tenant_id: TenantId::new(),
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg == "tenant mismatch"));
    }
}
