use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateRoot, DomainError, RecordId, TableBacked, TenantId};
use procura_events::Event;

use crate::evaluation::{EvaluationCriteria, RankedResponse};
use crate::response::RfpResponseId;

procura_core::record_id!(
    /// RFP identifier (row of `rfps`).
    RfpId
);

/// RFP status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfpStatus {
    Draft,
    Published,
    Closed,
    Evaluated,
    Awarded,
    Cancelled,
}

/// Aggregate root: Rfp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rfp {
    id: RfpId,
    tenant_id: Option<TenantId>,
    rfp_number: String,
    title: String,
    description: Option<String>,
    submission_deadline: Option<DateTime<Utc>>,
    estimated_budget: Option<f64>,
    evaluation_criteria: EvaluationCriteria,
    status: RfpStatus,
    evaluation: Vec<RankedResponse>,
    awarded_response_id: Option<RfpResponseId>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl Rfp {
    pub fn empty(id: RfpId) -> Self {
        Self {
            id,
            tenant_id: None,
            rfp_number: String::new(),
            title: String::new(),
            description: None,
            submission_deadline: None,
            estimated_budget: None,
            evaluation_criteria: EvaluationCriteria::price_l1(),
            status: RfpStatus::Draft,
            evaluation: Vec::new(),
            awarded_response_id: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RfpId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn rfp_number(&self) -> &str {
        &self.rfp_number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn submission_deadline(&self) -> Option<DateTime<Utc>> {
        self.submission_deadline
    }

    pub fn estimated_budget(&self) -> Option<f64> {
        self.estimated_budget
    }

    pub fn evaluation_criteria(&self) -> &EvaluationCriteria {
        &self.evaluation_criteria
    }

    pub fn status(&self) -> RfpStatus {
        self.status
    }

    /// Ranking recorded when the evaluation was closed.
    pub fn evaluation(&self) -> &[RankedResponse] {
        &self.evaluation
    }

    pub fn awarded_response_id(&self) -> Option<RfpResponseId> {
        self.awarded_response_id
    }
}

impl AggregateRoot for Rfp {
    type Id = RfpId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TableBacked for Rfp {
    const TABLE: &'static str = "rfps";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// Command: CreateRfp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRfp {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub rfp_number: String,
    pub title: String,
    pub description: Option<String>,
    pub submission_deadline: Option<DateTime<Utc>>,
    pub estimated_budget: Option<f64>,
    pub evaluation_criteria: EvaluationCriteria,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateRfp (draft only). `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRfp {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub submission_deadline: Option<DateTime<Utc>>,
    pub estimated_budget: Option<f64>,
    pub evaluation_criteria: Option<EvaluationCriteria>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRfp {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRfp {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordEvaluation. The ranking is computed by the caller with
/// [`crate::evaluate`] over the RFP's current responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvaluation {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub ranking: Vec<RankedResponse>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardRfp {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub response_id: RfpResponseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRfp {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RfpCommand {
    CreateRfp(CreateRfp),
    UpdateRfp(UpdateRfp),
    PublishRfp(PublishRfp),
    CloseRfp(CloseRfp),
    RecordEvaluation(RecordEvaluation),
    AwardRfp(AwardRfp),
    CancelRfp(CancelRfp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfpCreated {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub rfp_number: String,
    pub title: String,
    pub description: Option<String>,
    pub submission_deadline: Option<DateTime<Utc>>,
    pub estimated_budget: Option<f64>,
    pub evaluation_criteria: EvaluationCriteria,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfpUpdated {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub title: String,
    pub description: Option<String>,
    pub submission_deadline: Option<DateTime<Utc>>,
    pub estimated_budget: Option<f64>,
    pub evaluation_criteria: EvaluationCriteria,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfpPublished {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfpClosed {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfpEvaluated {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub ranking: Vec<RankedResponse>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfpAwarded {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub response_id: RfpResponseId,
    pub vendor_name: String,
    pub final_score: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfpCancelled {
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RfpEvent {
    RfpCreated(RfpCreated),
    RfpUpdated(RfpUpdated),
    RfpPublished(RfpPublished),
    RfpClosed(RfpClosed),
    RfpEvaluated(RfpEvaluated),
    RfpAwarded(RfpAwarded),
    RfpCancelled(RfpCancelled),
}

impl Event for RfpEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RfpEvent::RfpCreated(_) => "rfp.rfp.created",
            RfpEvent::RfpUpdated(_) => "rfp.rfp.updated",
            RfpEvent::RfpPublished(_) => "rfp.rfp.published",
            RfpEvent::RfpClosed(_) => "rfp.rfp.closed",
            RfpEvent::RfpEvaluated(_) => "rfp.rfp.evaluated",
            RfpEvent::RfpAwarded(_) => "rfp.rfp.awarded",
            RfpEvent::RfpCancelled(_) => "rfp.rfp.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RfpEvent::RfpCreated(e) => e.occurred_at,
            RfpEvent::RfpUpdated(e) => e.occurred_at,
            RfpEvent::RfpPublished(e) => e.occurred_at,
            RfpEvent::RfpClosed(e) => e.occurred_at,
            RfpEvent::RfpEvaluated(e) => e.occurred_at,
            RfpEvent::RfpAwarded(e) => e.occurred_at,
            RfpEvent::RfpCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Rfp {
    type Command = RfpCommand;
    type Event = RfpEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RfpEvent::RfpCreated(e) => {
                self.id = e.rfp_id;
                self.tenant_id = Some(e.tenant_id);
                self.rfp_number = e.rfp_number.clone();
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.submission_deadline = e.submission_deadline;
                self.estimated_budget = e.estimated_budget;
                self.evaluation_criteria = e.evaluation_criteria;
                self.status = RfpStatus::Draft;
                self.created = true;
            }
            RfpEvent::RfpUpdated(e) => {
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.submission_deadline = e.submission_deadline;
                self.estimated_budget = e.estimated_budget;
                self.evaluation_criteria = e.evaluation_criteria;
            }
            RfpEvent::RfpPublished(_) => self.status = RfpStatus::Published,
            RfpEvent::RfpClosed(_) => self.status = RfpStatus::Closed,
            RfpEvent::RfpEvaluated(e) => {
                self.evaluation = e.ranking.clone();
                self.status = RfpStatus::Evaluated;
            }
            RfpEvent::RfpAwarded(e) => {
                self.awarded_response_id = Some(e.response_id);
                self.status = RfpStatus::Awarded;
            }
            RfpEvent::RfpCancelled(e) => {
                self.cancel_reason = e.reason.clone();
                self.status = RfpStatus::Cancelled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RfpCommand::CreateRfp(cmd) => self.handle_create(cmd),
            RfpCommand::UpdateRfp(cmd) => self.handle_update(cmd),
            RfpCommand::PublishRfp(cmd) => self.handle_publish(cmd),
            RfpCommand::CloseRfp(cmd) => self.handle_close(cmd),
            RfpCommand::RecordEvaluation(cmd) => self.handle_record_evaluation(cmd),
            RfpCommand::AwardRfp(cmd) => self.handle_award(cmd),
            RfpCommand::CancelRfp(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Rfp {
    fn ensure_existing(&self, tenant_id: TenantId, rfp_id: RfpId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != rfp_id {
            return Err(DomainError::invariant("rfp_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: RfpStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(format!(
                "cannot {action} an RFP in status {:?}",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRfp) -> Result<Vec<RfpEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("rfp already exists"));
        }
        DomainError::require_text("rfp_number", &cmd.rfp_number)?;
        DomainError::require_text("title", &cmd.title)?;
        if let Some(budget) = cmd.estimated_budget {
            DomainError::require_non_negative("estimated_budget", budget)?;
        }
        cmd.evaluation_criteria.validate()?;

        Ok(vec![RfpEvent::RfpCreated(RfpCreated {
            tenant_id: cmd.tenant_id,
            rfp_id: cmd.rfp_id,
            rfp_number: cmd.rfp_number.trim().to_string(),
            title: cmd.title.trim().to_string(),
            description: cmd.description.clone(),
            submission_deadline: cmd.submission_deadline,
            estimated_budget: cmd.estimated_budget,
            evaluation_criteria: cmd.evaluation_criteria,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateRfp) -> Result<Vec<RfpEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.rfp_id)?;
        self.ensure_status(RfpStatus::Draft, "edit")?;

        let title = cmd.title.clone().unwrap_or_else(|| self.title.clone());
        DomainError::require_text("title", &title)?;
        let estimated_budget = cmd.estimated_budget.or(self.estimated_budget);
        if let Some(budget) = estimated_budget {
            DomainError::require_non_negative("estimated_budget", budget)?;
        }
        let evaluation_criteria = cmd.evaluation_criteria.unwrap_or(self.evaluation_criteria);
        evaluation_criteria.validate()?;

        Ok(vec![RfpEvent::RfpUpdated(RfpUpdated {
            tenant_id: cmd.tenant_id,
            rfp_id: cmd.rfp_id,
            title: title.trim().to_string(),
            description: cmd.description.clone().or_else(|| self.description.clone()),
            submission_deadline: cmd.submission_deadline.or(self.submission_deadline),
            estimated_budget,
            evaluation_criteria,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_publish(&self, cmd: &PublishRfp) -> Result<Vec<RfpEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.rfp_id)?;
        self.ensure_status(RfpStatus::Draft, "publish")?;

        match self.submission_deadline {
            None => return Err(DomainError::validation("submission_deadline is required to publish")),
            Some(deadline) if deadline <= cmd.occurred_at => {
                return Err(DomainError::validation("submission_deadline must be in the future"));
            }
            Some(_) => {}
        }
        self.evaluation_criteria.validate()?;

        Ok(vec![RfpEvent::RfpPublished(RfpPublished {
            tenant_id: cmd.tenant_id,
            rfp_id: cmd.rfp_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseRfp) -> Result<Vec<RfpEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.rfp_id)?;
        self.ensure_status(RfpStatus::Published, "close")?;

        Ok(vec![RfpEvent::RfpClosed(RfpClosed {
            tenant_id: cmd.tenant_id,
            rfp_id: cmd.rfp_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_evaluation(&self, cmd: &RecordEvaluation) -> Result<Vec<RfpEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.rfp_id)?;
        self.ensure_status(RfpStatus::Closed, "evaluate")?;

        if cmd.ranking.is_empty() {
            return Err(DomainError::invariant("no scored responses to evaluate"));
        }

        Ok(vec![RfpEvent::RfpEvaluated(RfpEvaluated {
            tenant_id: cmd.tenant_id,
            rfp_id: cmd.rfp_id,
            ranking: cmd.ranking.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_award(&self, cmd: &AwardRfp) -> Result<Vec<RfpEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.rfp_id)?;
        self.ensure_status(RfpStatus::Evaluated, "award")?;

        let ranked = self
            .evaluation
            .iter()
            .find(|r| r.response_id == cmd.response_id)
            .ok_or_else(|| DomainError::invariant("response is not part of the recorded evaluation"))?;

        Ok(vec![RfpEvent::RfpAwarded(RfpAwarded {
            tenant_id: cmd.tenant_id,
            rfp_id: cmd.rfp_id,
            response_id: cmd.response_id,
            vendor_name: ranked.vendor_name.clone(),
            final_score: ranked.final_score,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelRfp) -> Result<Vec<RfpEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.rfp_id)?;

        if !matches!(
            self.status,
            RfpStatus::Draft | RfpStatus::Published | RfpStatus::Closed
        ) {
            return Err(DomainError::invariant(format!(
                "cannot cancel an RFP in status {:?}",
                self.status
            )));
        }

        Ok(vec![RfpEvent::RfpCancelled(RfpCancelled {
            tenant_id: cmd.tenant_id,
            rfp_id: cmd.rfp_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::evaluation::{ScoringInput, rank_responses};

    fn run(rfp: &mut Rfp, cmd: RfpCommand) -> Result<(), DomainError> {
        let events = rfp.handle(&cmd)?;
        for e in &events {
            rfp.apply(e);
        }
        Ok(())
    }

    fn created(tenant_id: TenantId, criteria: EvaluationCriteria) -> Rfp {
        let rfp_id = RfpId::generate();
        let mut rfp = Rfp::empty(rfp_id);
        run(
            &mut rfp,
            RfpCommand::CreateRfp(CreateRfp {
                tenant_id,
                rfp_id,
                rfp_number: "RFP-2026-001".to_string(),
                title: "Office laptops".to_string(),
                description: None,
                submission_deadline: Some(Utc::now() + Duration::days(14)),
                estimated_budget: Some(50_000.0),
                evaluation_criteria: criteria,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        rfp
    }

    fn advance_to_closed(rfp: &mut Rfp, tenant_id: TenantId) {
        let rfp_id = rfp.id_typed();
        run(rfp, RfpCommand::PublishRfp(PublishRfp { tenant_id, rfp_id, occurred_at: Utc::now() })).unwrap();
        run(rfp, RfpCommand::CloseRfp(CloseRfp { tenant_id, rfp_id, occurred_at: Utc::now() })).unwrap();
    }

    #[test]
    fn create_rejects_invalid_qcbs_weights() {
        let rfp_id = RfpId::generate();
        let err = Rfp::empty(rfp_id)
            .handle(&RfpCommand::CreateRfp(CreateRfp {
                tenant_id: TenantId::new(),
                rfp_id,
                rfp_number: "RFP-1".to_string(),
                title: "Servers".to_string(),
                description: None,
                submission_deadline: None,
                estimated_budget: None,
                evaluation_criteria: EvaluationCriteria::qcbs(80.0, 30.0),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_lifecycle_through_award() {
        let tenant_id = TenantId::new();
        let mut rfp = created(tenant_id, EvaluationCriteria::qcbs(70.0, 30.0));
        advance_to_closed(&mut rfp, tenant_id);
        assert_eq!(rfp.status(), RfpStatus::Closed);

        let winner = RfpResponseId::generate();
        let ranking = rank_responses(
            rfp.evaluation_criteria(),
            &[
                ScoringInput {
                    response_id: winner,
                    vendor_name: "Acme".to_string(),
                    technical_score: 85.0,
                    commercial_score: 90.0,
                },
                ScoringInput {
                    response_id: RfpResponseId::generate(),
                    vendor_name: "Globex".to_string(),
                    technical_score: 78.0,
                    commercial_score: 95.0,
                },
            ],
        );
        let rfp_id = rfp.id_typed();
        run(
            &mut rfp,
            RfpCommand::RecordEvaluation(RecordEvaluation { tenant_id, rfp_id, ranking, occurred_at: Utc::now() }),
        )
        .unwrap();
        assert_eq!(rfp.status(), RfpStatus::Evaluated);
        assert_eq!(rfp.evaluation()[0].response_id, winner);

        let events = rfp
            .handle(&RfpCommand::AwardRfp(AwardRfp {
                tenant_id,
                rfp_id,
                response_id: winner,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[0] {
            RfpEvent::RfpAwarded(e) => {
                assert_eq!(e.vendor_name, "Acme");
                assert!((e.final_score - 86.5).abs() < 1e-9);
            }
            other => panic!("expected RfpAwarded, got {other:?}"),
        }
        rfp.apply(&events[0]);
        assert_eq!(rfp.status(), RfpStatus::Awarded);
        assert_eq!(rfp.awarded_response_id(), Some(winner));
    }

    #[test]
    fn award_of_unranked_response_is_rejected() {
        let tenant_id = TenantId::new();
        let mut rfp = created(tenant_id, EvaluationCriteria::technical_l1());
        advance_to_closed(&mut rfp, tenant_id);
        let rfp_id = rfp.id_typed();
        let ranking = rank_responses(
            rfp.evaluation_criteria(),
            &[ScoringInput {
                response_id: RfpResponseId::generate(),
                vendor_name: "Acme".to_string(),
                technical_score: 60.0,
                commercial_score: 60.0,
            }],
        );
        run(
            &mut rfp,
            RfpCommand::RecordEvaluation(RecordEvaluation { tenant_id, rfp_id, ranking, occurred_at: Utc::now() }),
        )
        .unwrap();

        let err = rfp
            .handle(&RfpCommand::AwardRfp(AwardRfp {
                tenant_id,
                rfp_id,
                response_id: RfpResponseId::generate(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn publish_requires_future_deadline() {
        let tenant_id = TenantId::new();
        let mut rfp = created(tenant_id, EvaluationCriteria::price_l1());
        let rfp_id = rfp.id_typed();
        let err = rfp
            .handle(&RfpCommand::PublishRfp(PublishRfp {
                tenant_id,
                rfp_id,
                occurred_at: Utc::now() + Duration::days(30),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("future")));

        run(&mut rfp, RfpCommand::PublishRfp(PublishRfp { tenant_id, rfp_id, occurred_at: Utc::now() })).unwrap();
        let err = rfp
            .handle(&RfpCommand::UpdateRfp(UpdateRfp {
                tenant_id,
                rfp_id,
                title: Some("Changed".to_string()),
                description: None,
                submission_deadline: None,
                estimated_budget: None,
                evaluation_criteria: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn awarded_rfp_cannot_be_cancelled() {
        let tenant_id = TenantId::new();
        let mut rfp = created(tenant_id, EvaluationCriteria::price_l1());
        let rfp_id = rfp.id_typed();
        run(&mut rfp, RfpCommand::CancelRfp(CancelRfp { tenant_id, rfp_id, reason: None, occurred_at: Utc::now() }))
            .unwrap();
        assert_eq!(rfp.status(), RfpStatus::Cancelled);
        assert!(rfp
            .handle(&RfpCommand::CancelRfp(CancelRfp { tenant_id, rfp_id, reason: None, occurred_at: Utc::now() }))
            .is_err());
    }
}
