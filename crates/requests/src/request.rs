use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateRoot, DomainError, RecordId, TableBacked, TenantId, UserId};
use procura_events::Event;

procura_core::record_id!(RequestId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Submitted,
    InReview,
    Approved,
    Rejected,
    Completed,
    Canceled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Requested line (`procurement_request_items`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    pub line_no: u32,
    pub description: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    pub estimated_unit_price: f64,
}

impl RequestItem {
    pub fn estimated_total(&self) -> f64 {
        self.quantity * self.estimated_unit_price
    }
}

/// Aggregate root: ProcurementRequest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcurementRequest {
    id: RequestId,
    tenant_id: Option<TenantId>,
    request_number: String,
    title: String,
    description: Option<String>,
    department: String,
    requested_by: Option<UserId>,
    priority: Priority,
    required_by: Option<NaiveDate>,
    status: RequestStatus,
    items: Vec<RequestItem>,
    reviewed_by: Option<UserId>,
    decided_by: Option<UserId>,
    rejection_reason: Option<String>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl ProcurementRequest {
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            tenant_id: None,
            request_number: String::new(),
            title: String::new(),
            description: None,
            department: String::new(),
            requested_by: None,
            priority: Priority::Medium,
            required_by: None,
            status: RequestStatus::Draft,
            items: Vec::new(),
            reviewed_by: None,
            decided_by: None,
            rejection_reason: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn request_number(&self) -> &str {
        &self.request_number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn required_by(&self) -> Option<NaiveDate> {
        self.required_by
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn items(&self) -> &[RequestItem] {
        &self.items
    }

    pub fn decided_by(&self) -> Option<UserId> {
        self.decided_by
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// `Σ quantity * estimated_unit_price`.
    pub fn estimated_total(&self) -> f64 {
        self.items.iter().map(RequestItem::estimated_total).sum()
    }
}

impl AggregateRoot for ProcurementRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TableBacked for ProcurementRequest {
    const TABLE: &'static str = "procurement_requests";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// Command: CreateRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub request_number: String,
    pub title: String,
    pub description: Option<String>,
    pub department: String,
    pub requested_by: UserId,
    pub priority: Priority,
    pub required_by: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateRequest (draft only). `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub priority: Option<Priority>,
    pub required_by: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem (draft only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddItem {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub description: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub estimated_unit_price: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReview {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub reviewer: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestCommand {
    CreateRequest(CreateRequest),
    UpdateRequest(UpdateRequest),
    AddItem(AddItem),
    RemoveItem(RemoveItem),
    SubmitRequest(SubmitRequest),
    StartReview(StartReview),
    ApproveRequest(ApproveRequest),
    RejectRequest(RejectRequest),
    CompleteRequest(CompleteRequest),
    CancelRequest(CancelRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCreated {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub request_number: String,
    pub title: String,
    pub description: Option<String>,
    pub department: String,
    pub requested_by: UserId,
    pub priority: Priority,
    pub required_by: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUpdated {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub title: String,
    pub description: Option<String>,
    pub department: String,
    pub priority: Priority,
    pub required_by: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestItemAdded {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub item: RequestItem,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItemRemoved {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSubmitted {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub estimated_total: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReviewStarted {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub reviewer: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestApproved. Carries enough context for notification templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestApproved {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub request_number: String,
    pub title: String,
    pub approved_by: UserId,
    pub estimated_total: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub request_number: String,
    pub title: String,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCompleted {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCanceled {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestEvent {
    RequestCreated(RequestCreated),
    RequestUpdated(RequestUpdated),
    RequestItemAdded(RequestItemAdded),
    RequestItemRemoved(RequestItemRemoved),
    RequestSubmitted(RequestSubmitted),
    RequestReviewStarted(RequestReviewStarted),
    RequestApproved(RequestApproved),
    RequestRejected(RequestRejected),
    RequestCompleted(RequestCompleted),
    RequestCanceled(RequestCanceled),
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::RequestCreated(_) => "requests.request.created",
            RequestEvent::RequestUpdated(_) => "requests.request.updated",
            RequestEvent::RequestItemAdded(_) => "requests.request.item_added",
            RequestEvent::RequestItemRemoved(_) => "requests.request.item_removed",
            RequestEvent::RequestSubmitted(_) => "requests.request.submitted",
            RequestEvent::RequestReviewStarted(_) => "requests.request.review_started",
            RequestEvent::RequestApproved(_) => "requests.request.approved",
            RequestEvent::RequestRejected(_) => "requests.request.rejected",
            RequestEvent::RequestCompleted(_) => "requests.request.completed",
            RequestEvent::RequestCanceled(_) => "requests.request.canceled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::RequestCreated(e) => e.occurred_at,
            RequestEvent::RequestUpdated(e) => e.occurred_at,
            RequestEvent::RequestItemAdded(e) => e.occurred_at,
            RequestEvent::RequestItemRemoved(e) => e.occurred_at,
            RequestEvent::RequestSubmitted(e) => e.occurred_at,
            RequestEvent::RequestReviewStarted(e) => e.occurred_at,
            RequestEvent::RequestApproved(e) => e.occurred_at,
            RequestEvent::RequestRejected(e) => e.occurred_at,
            RequestEvent::RequestCompleted(e) => e.occurred_at,
            RequestEvent::RequestCanceled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProcurementRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::RequestCreated(e) => {
                self.id = e.request_id;
                self.tenant_id = Some(e.tenant_id);
                self.request_number = e.request_number.clone();
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.department = e.department.clone();
                self.requested_by = Some(e.requested_by);
                self.priority = e.priority;
                self.required_by = e.required_by;
                self.status = RequestStatus::Draft;
                self.items.clear();
                self.created = true;
            }
            RequestEvent::RequestUpdated(e) => {
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.department = e.department.clone();
                self.priority = e.priority;
                self.required_by = e.required_by;
            }
            RequestEvent::RequestItemAdded(e) => self.items.push(e.item.clone()),
            RequestEvent::RequestItemRemoved(e) => self.items.retain(|i| i.line_no != e.line_no),
            RequestEvent::RequestSubmitted(_) => self.status = RequestStatus::Submitted,
            RequestEvent::RequestReviewStarted(e) => {
                self.reviewed_by = Some(e.reviewer);
                self.status = RequestStatus::InReview;
            }
            RequestEvent::RequestApproved(e) => {
                self.decided_by = Some(e.approved_by);
                self.status = RequestStatus::Approved;
            }
            RequestEvent::RequestRejected(e) => {
                self.decided_by = Some(e.rejected_by);
                self.rejection_reason = Some(e.reason.clone());
                self.status = RequestStatus::Rejected;
            }
            RequestEvent::RequestCompleted(_) => self.status = RequestStatus::Completed,
            RequestEvent::RequestCanceled(e) => {
                self.cancel_reason = e.reason.clone();
                self.status = RequestStatus::Canceled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::CreateRequest(cmd) => self.handle_create(cmd),
            RequestCommand::UpdateRequest(cmd) => self.handle_update(cmd),
            RequestCommand::AddItem(cmd) => self.handle_add_item(cmd),
            RequestCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            RequestCommand::SubmitRequest(cmd) => self.handle_submit(cmd),
            RequestCommand::StartReview(cmd) => self.handle_start_review(cmd),
            RequestCommand::ApproveRequest(cmd) => self.handle_approve(cmd),
            RequestCommand::RejectRequest(cmd) => self.handle_reject(cmd),
            RequestCommand::CompleteRequest(cmd) => self.handle_complete(cmd),
            RequestCommand::CancelRequest(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ProcurementRequest {
    fn ensure_existing(&self, tenant_id: TenantId, request_id: RequestId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, allowed: &[RequestStatus], action: &str) -> Result<(), DomainError> {
        if !allowed.contains(&self.status) {
            return Err(DomainError::invariant(format!(
                "cannot {action} a request in status {:?}",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("procurement request already exists"));
        }
        DomainError::require_text("request_number", &cmd.request_number)?;
        DomainError::require_text("title", &cmd.title)?;
        DomainError::require_text("department", &cmd.department)?;

        Ok(vec![RequestEvent::RequestCreated(RequestCreated {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            request_number: cmd.request_number.trim().to_string(),
            title: cmd.title.trim().to_string(),
            description: cmd.description.clone(),
            department: cmd.department.trim().to_string(),
            requested_by: cmd.requested_by,
            priority: cmd.priority,
            required_by: cmd.required_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::Draft], "edit")?;

        let title = cmd.title.clone().unwrap_or_else(|| self.title.clone());
        let department = cmd.department.clone().unwrap_or_else(|| self.department.clone());
        DomainError::require_text("title", &title)?;
        DomainError::require_text("department", &department)?;

        Ok(vec![RequestEvent::RequestUpdated(RequestUpdated {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            title: title.trim().to_string(),
            description: cmd.description.clone().or_else(|| self.description.clone()),
            department: department.trim().to_string(),
            priority: cmd.priority.unwrap_or(self.priority),
            required_by: cmd.required_by.or(self.required_by),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::Draft], "modify items of")?;

        DomainError::require_text("description", &cmd.description)?;
        if !cmd.quantity.is_finite() || cmd.quantity <= 0.0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        DomainError::require_non_negative("estimated_unit_price", cmd.estimated_unit_price)?;

        let line_no = self.items.iter().map(|i| i.line_no).max().unwrap_or(0) + 1;
        Ok(vec![RequestEvent::RequestItemAdded(RequestItemAdded {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            item: RequestItem {
                line_no,
                description: cmd.description.trim().to_string(),
                quantity: cmd.quantity,
                unit: cmd.unit.clone(),
                estimated_unit_price: cmd.estimated_unit_price,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::Draft], "modify items of")?;

        if !self.items.iter().any(|i| i.line_no == cmd.line_no) {
            return Err(DomainError::not_found());
        }

        Ok(vec![RequestEvent::RequestItemRemoved(RequestItemRemoved {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::Draft], "submit")?;

        if self.items.is_empty() {
            return Err(DomainError::validation("cannot submit a request without items"));
        }

        Ok(vec![RequestEvent::RequestSubmitted(RequestSubmitted {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            estimated_total: self.estimated_total(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_review(&self, cmd: &StartReview) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::Submitted], "review")?;

        Ok(vec![RequestEvent::RequestReviewStarted(RequestReviewStarted {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            reviewer: cmd.reviewer,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::InReview], "approve")?;

        Ok(vec![RequestEvent::RequestApproved(RequestApproved {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            request_number: self.request_number.clone(),
            title: self.title.clone(),
            approved_by: cmd.approved_by,
            estimated_total: self.estimated_total(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::InReview], "reject")?;
        DomainError::require_text("reason", &cmd.reason)?;

        Ok(vec![RequestEvent::RequestRejected(RequestRejected {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            request_number: self.request_number.clone(),
            title: self.title.clone(),
            rejected_by: cmd.rejected_by,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(&[RequestStatus::Approved], "complete")?;

        Ok(vec![RequestEvent::RequestCompleted(RequestCompleted {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.request_id)?;
        self.ensure_status(
            &[
                RequestStatus::Draft,
                RequestStatus::Submitted,
                RequestStatus::InReview,
                RequestStatus::Approved,
            ],
            "cancel",
        )?;

        Ok(vec![RequestEvent::RequestCanceled(RequestCanceled {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
pub(crate) fn test_request(tenant_id: TenantId, items: &[(f64, f64)]) -> ProcurementRequest {
    let request_id = RequestId::generate();
    let mut request = ProcurementRequest::empty(request_id);
    let mut commands = vec![RequestCommand::CreateRequest(CreateRequest {
        tenant_id,
        request_id,
        request_number: "PR-0001".to_string(),
        title: "Laptops for new hires".to_string(),
        description: None,
        department: "IT".to_string(),
        requested_by: UserId::new(),
        priority: Priority::High,
        required_by: None,
        occurred_at: Utc::now(),
    })];
    for (quantity, price) in items {
        commands.push(RequestCommand::AddItem(AddItem {
            tenant_id,
            request_id,
            description: "Laptop".to_string(),
            quantity: *quantity,
            unit: Some("pcs".to_string()),
            estimated_unit_price: *price,
            occurred_at: Utc::now(),
        }));
    }
    for command in commands {
        for event in request.handle(&command).unwrap() {
            request.apply(&event);
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(request: &mut ProcurementRequest, cmd: RequestCommand) -> Result<Vec<RequestEvent>, DomainError> {
        let events = request.handle(&cmd)?;
        for e in &events {
            request.apply(e);
        }
        Ok(events)
    }

    #[test]
    fn submit_requires_items() {
        let tenant_id = TenantId::new();
        let request = test_request(tenant_id, &[]);
        let err = request
            .handle(&RequestCommand::SubmitRequest(SubmitRequest {
                tenant_id,
                request_id: request.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn happy_path_reaches_completed() {
        let tenant_id = TenantId::new();
        let mut request = test_request(tenant_id, &[(2.0, 1200.0), (1.0, 300.0)]);
        let request_id = request.id_typed();
        let officer = UserId::new();

        run(&mut request, RequestCommand::SubmitRequest(SubmitRequest { tenant_id, request_id, occurred_at: Utc::now() }))
            .unwrap();
        run(
            &mut request,
            RequestCommand::StartReview(StartReview { tenant_id, request_id, reviewer: officer, occurred_at: Utc::now() }),
        )
        .unwrap();
        let events = run(
            &mut request,
            RequestCommand::ApproveRequest(ApproveRequest {
                tenant_id,
                request_id,
                approved_by: officer,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        match &events[0] {
            RequestEvent::RequestApproved(e) => {
                assert_eq!(e.request_number, "PR-0001");
                assert_eq!(e.estimated_total, 2700.0);
            }
            other => panic!("expected RequestApproved, got {other:?}"),
        }

        run(&mut request, RequestCommand::CompleteRequest(CompleteRequest { tenant_id, request_id, occurred_at: Utc::now() }))
            .unwrap();
        assert_eq!(request.status(), RequestStatus::Completed);
        assert_eq!(request.decided_by(), Some(officer));
    }

    #[test]
    fn approve_skipping_review_is_rejected() {
        let tenant_id = TenantId::new();
        let mut request = test_request(tenant_id, &[(1.0, 10.0)]);
        let request_id = request.id_typed();
        run(&mut request, RequestCommand::SubmitRequest(SubmitRequest { tenant_id, request_id, occurred_at: Utc::now() }))
            .unwrap();

        let err = request
            .handle(&RequestCommand::ApproveRequest(ApproveRequest {
                tenant_id,
                request_id,
                approved_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn items_are_frozen_after_submit() {
        let tenant_id = TenantId::new();
        let mut request = test_request(tenant_id, &[(1.0, 10.0)]);
        let request_id = request.id_typed();
        run(&mut request, RequestCommand::SubmitRequest(SubmitRequest { tenant_id, request_id, occurred_at: Utc::now() }))
            .unwrap();

        let err = request
            .handle(&RequestCommand::RemoveItem(RemoveItem { tenant_id, request_id, line_no: 1, occurred_at: Utc::now() }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn removed_line_numbers_are_not_reused() {
        let tenant_id = TenantId::new();
        let mut request = test_request(tenant_id, &[(1.0, 10.0), (1.0, 20.0)]);
        let request_id = request.id_typed();
        run(&mut request, RequestCommand::RemoveItem(RemoveItem { tenant_id, request_id, line_no: 1, occurred_at: Utc::now() }))
            .unwrap();
        run(
            &mut request,
            RequestCommand::AddItem(AddItem {
                tenant_id,
                request_id,
                description: "Dock".to_string(),
                quantity: 1.0,
                unit: None,
                estimated_unit_price: 5.0,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let lines: Vec<u32> = request.items().iter().map(|i| i.line_no).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn completed_request_cannot_be_canceled() {
        let tenant_id = TenantId::new();
        let mut request = test_request(tenant_id, &[(1.0, 10.0)]);
        let request_id = request.id_typed();
        run(&mut request, RequestCommand::CancelRequest(CancelRequest { tenant_id, request_id, reason: None, occurred_at: Utc::now() }))
            .unwrap();
        assert_eq!(request.status(), RequestStatus::Canceled);
        assert!(request
            .handle(&RequestCommand::CancelRequest(CancelRequest { tenant_id, request_id, reason: None, occurred_at: Utc::now() }))
            .is_err());
    }
}
