//! Vendor responses to an RFP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateRoot, DomainError, RecordId, TableBacked, TenantId};
use procura_events::Event;

use crate::criteria::CriterionMark;
use crate::rfp::{RfpId, RfpStatus};

procura_core::record_id!(
    /// Response identifier (row of `rfp_responses`).
    RfpResponseId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfpResponseStatus {
    Submitted,
    Evaluated,
    Awarded,
    Rejected,
}

/// Quoted line of a response (`rfp_response_items`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseItem {
    pub line_no: u32,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl ResponseItem {
    pub fn total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// Aggregate root: RfpResponse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfpResponse {
    id: RfpResponseId,
    tenant_id: Option<TenantId>,
    rfp_id: Option<RfpId>,
    vendor_id: Option<RecordId>,
    vendor_name: String,
    items: Vec<ResponseItem>,
    total_amount: f64,
    technical_score: Option<f64>,
    commercial_score: Option<f64>,
    criterion_marks: Vec<CriterionMark>,
    status: RfpResponseStatus,
    submitted_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl RfpResponse {
    pub fn empty(id: RfpResponseId) -> Self {
        Self {
            id,
            tenant_id: None,
            rfp_id: None,
            vendor_id: None,
            vendor_name: String::new(),
            items: Vec::new(),
            total_amount: 0.0,
            technical_score: None,
            commercial_score: None,
            criterion_marks: Vec::new(),
            status: RfpResponseStatus::Submitted,
            submitted_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RfpResponseId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn rfp_id(&self) -> Option<RfpId> {
        self.rfp_id
    }

    pub fn vendor_id(&self) -> Option<RecordId> {
        self.vendor_id
    }

    pub fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    pub fn items(&self) -> &[ResponseItem] {
        &self.items
    }

    pub fn total_amount(&self) -> f64 {
        self.total_amount
    }

    pub fn technical_score(&self) -> Option<f64> {
        self.technical_score
    }

    pub fn commercial_score(&self) -> Option<f64> {
        self.commercial_score
    }

    pub fn criterion_marks(&self) -> &[CriterionMark] {
        &self.criterion_marks
    }

    pub fn status(&self) -> RfpResponseStatus {
        self.status
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Rejected responses are out of the competition.
    pub fn is_rankable(&self) -> bool {
        self.status != RfpResponseStatus::Rejected
    }
}

impl AggregateRoot for RfpResponse {
    type Id = RfpResponseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TableBacked for RfpResponse {
    const TABLE: &'static str = "rfp_responses";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// Command: SubmitResponse.
///
/// Carries the parent RFP's status and deadline as read by the caller; the
/// response aggregate cannot see other rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub rfp_id: RfpId,
    pub rfp_status: RfpStatus,
    pub rfp_deadline: DateTime<Utc>,
    pub vendor_id: RecordId,
    pub vendor_name: String,
    pub items: Vec<ResponseItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ScoreResponse. Either score may be recorded separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub technical_score: Option<f64>,
    pub commercial_score: Option<f64>,
    #[serde(default)]
    pub criterion_marks: Vec<CriterionMark>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAwarded {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRejected {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RfpResponseCommand {
    SubmitResponse(SubmitResponse),
    ScoreResponse(ScoreResponse),
    MarkAwarded(MarkAwarded),
    MarkRejected(MarkRejected),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSubmitted {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub rfp_id: RfpId,
    pub vendor_id: RecordId,
    pub vendor_name: String,
    pub items: Vec<ResponseItem>,
    pub total_amount: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseScored {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub technical_score: Option<f64>,
    pub commercial_score: Option<f64>,
    pub criterion_marks: Vec<CriterionMark>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseAwarded {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRejected {
    pub tenant_id: TenantId,
    pub response_id: RfpResponseId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RfpResponseEvent {
    ResponseSubmitted(ResponseSubmitted),
    ResponseScored(ResponseScored),
    ResponseAwarded(ResponseAwarded),
    ResponseRejected(ResponseRejected),
}

impl Event for RfpResponseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RfpResponseEvent::ResponseSubmitted(_) => "rfp.response.submitted",
            RfpResponseEvent::ResponseScored(_) => "rfp.response.scored",
            RfpResponseEvent::ResponseAwarded(_) => "rfp.response.awarded",
            RfpResponseEvent::ResponseRejected(_) => "rfp.response.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RfpResponseEvent::ResponseSubmitted(e) => e.occurred_at,
            RfpResponseEvent::ResponseScored(e) => e.occurred_at,
            RfpResponseEvent::ResponseAwarded(e) => e.occurred_at,
            RfpResponseEvent::ResponseRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for RfpResponse {
    type Command = RfpResponseCommand;
    type Event = RfpResponseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RfpResponseEvent::ResponseSubmitted(e) => {
                self.id = e.response_id;
                self.tenant_id = Some(e.tenant_id);
                self.rfp_id = Some(e.rfp_id);
                self.vendor_id = Some(e.vendor_id);
                self.vendor_name = e.vendor_name.clone();
                self.items = e.items.clone();
                self.total_amount = e.total_amount;
                self.status = RfpResponseStatus::Submitted;
                self.submitted_at = Some(e.occurred_at);
                self.created = true;
            }
            RfpResponseEvent::ResponseScored(e) => {
                if e.technical_score.is_some() {
                    self.technical_score = e.technical_score;
                }
                if e.commercial_score.is_some() {
                    self.commercial_score = e.commercial_score;
                }
                if !e.criterion_marks.is_empty() {
                    self.criterion_marks = e.criterion_marks.clone();
                }
                if self.technical_score.is_some() && self.commercial_score.is_some() {
                    self.status = RfpResponseStatus::Evaluated;
                }
            }
            RfpResponseEvent::ResponseAwarded(_) => {
                self.status = RfpResponseStatus::Awarded;
            }
            RfpResponseEvent::ResponseRejected(_) => {
                self.status = RfpResponseStatus::Rejected;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RfpResponseCommand::SubmitResponse(cmd) => self.handle_submit(cmd),
            RfpResponseCommand::ScoreResponse(cmd) => self.handle_score(cmd),
            RfpResponseCommand::MarkAwarded(cmd) => self.handle_awarded(cmd),
            RfpResponseCommand::MarkRejected(cmd) => self.handle_rejected(cmd),
        }
    }
}

impl RfpResponse {
    fn ensure_existing(&self, tenant_id: TenantId, response_id: RfpResponseId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != response_id {
            return Err(DomainError::invariant("response_id mismatch"));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitResponse) -> Result<Vec<RfpResponseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("response already submitted"));
        }
        if cmd.rfp_status != RfpStatus::Published {
            return Err(DomainError::invariant("responses are only accepted while the RFP is published"));
        }
        if cmd.occurred_at > cmd.rfp_deadline {
            return Err(DomainError::invariant("submission deadline has passed"));
        }
        DomainError::require_text("vendor_name", &cmd.vendor_name)?;
        if cmd.items.is_empty() {
            return Err(DomainError::validation("a response must quote at least one item"));
        }

        let mut items = Vec::with_capacity(cmd.items.len());
        for (idx, item) in cmd.items.iter().enumerate() {
            DomainError::require_text("description", &item.description)?;
            if !item.quantity.is_finite() || item.quantity <= 0.0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            DomainError::require_non_negative("unit_price", item.unit_price)?;
            items.push(ResponseItem {
                line_no: idx as u32 + 1,
                ..item.clone()
            });
        }
        let total_amount = items.iter().map(ResponseItem::total).sum();

        Ok(vec![RfpResponseEvent::ResponseSubmitted(ResponseSubmitted {
            tenant_id: cmd.tenant_id,
            response_id: cmd.response_id,
            rfp_id: cmd.rfp_id,
            vendor_id: cmd.vendor_id,
            vendor_name: cmd.vendor_name.trim().to_string(),
            items,
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_score(&self, cmd: &ScoreResponse) -> Result<Vec<RfpResponseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.response_id)?;

        if !matches!(
            self.status,
            RfpResponseStatus::Submitted | RfpResponseStatus::Evaluated
        ) {
            return Err(DomainError::invariant("scores are frozen once a response is awarded or rejected"));
        }
        if cmd.technical_score.is_none() && cmd.commercial_score.is_none() {
            return Err(DomainError::validation("at least one score is required"));
        }
        if let Some(t) = cmd.technical_score {
            DomainError::require_percentage("technical_score", t)?;
        }
        if let Some(c) = cmd.commercial_score {
            DomainError::require_percentage("commercial_score", c)?;
        }

        Ok(vec![RfpResponseEvent::ResponseScored(ResponseScored {
            tenant_id: cmd.tenant_id,
            response_id: cmd.response_id,
            technical_score: cmd.technical_score,
            commercial_score: cmd.commercial_score,
            criterion_marks: cmd.criterion_marks.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_awarded(&self, cmd: &MarkAwarded) -> Result<Vec<RfpResponseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.response_id)?;

        if self.status != RfpResponseStatus::Evaluated {
            return Err(DomainError::invariant("only evaluated responses can be awarded"));
        }

        Ok(vec![RfpResponseEvent::ResponseAwarded(ResponseAwarded {
            tenant_id: cmd.tenant_id,
            response_id: cmd.response_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rejected(&self, cmd: &MarkRejected) -> Result<Vec<RfpResponseEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.response_id)?;

        match self.status {
            RfpResponseStatus::Awarded => {
                return Err(DomainError::invariant("an awarded response cannot be rejected"));
            }
            RfpResponseStatus::Rejected => return Ok(vec![]),
            _ => {}
        }

        Ok(vec![RfpResponseEvent::ResponseRejected(ResponseRejected {
            tenant_id: cmd.tenant_id,
            response_id: cmd.response_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
