use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateRoot, DomainError, RecordId, TableBacked, TenantId};
use procura_events::Event;

use crate::head::{BudgetHeadId, HeadType};

procura_core::record_id!(BudgetAllocationId);

/// Allocation approval lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

/// Aggregate root: BudgetAllocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    id: BudgetAllocationId,
    tenant_id: Option<TenantId>,
    fiscal_year: String,
    department: String,
    budget_head_id: Option<BudgetHeadId>,
    head_type: HeadType,
    allocated_amount: f64,
    approved_amount: Option<f64>,
    status: AllocationStatus,
    notes: Option<String>,
    rejection_reason: Option<String>,
    version: u64,
    created: bool,
}

impl BudgetAllocation {
    pub fn empty(id: BudgetAllocationId) -> Self {
        Self {
            id,
            tenant_id: None,
            fiscal_year: String::new(),
            department: String::new(),
            budget_head_id: None,
            head_type: HeadType::Expenditure,
            allocated_amount: 0.0,
            approved_amount: None,
            status: AllocationStatus::Draft,
            notes: None,
            rejection_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BudgetAllocationId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn fiscal_year(&self) -> &str {
        &self.fiscal_year
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn budget_head_id(&self) -> Option<BudgetHeadId> {
        self.budget_head_id
    }

    pub fn head_type(&self) -> HeadType {
        self.head_type
    }

    pub fn allocated_amount(&self) -> f64 {
        self.allocated_amount
    }

    pub fn approved_amount(&self) -> Option<f64> {
        self.approved_amount
    }

    pub fn status(&self) -> AllocationStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }
}

impl AggregateRoot for BudgetAllocation {
    type Id = BudgetAllocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TableBacked for BudgetAllocation {
    const TABLE: &'static str = "budget_allocations";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// Command: CreateAllocation. The head type is copied from the referenced
/// head by the caller so summaries never need a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAllocation {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub fiscal_year: String,
    pub department: String,
    pub budget_head_id: BudgetHeadId,
    pub head_type: HeadType,
    pub allocated_amount: f64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateAllocation (draft only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAllocation {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub department: Option<String>,
    pub allocated_amount: Option<f64>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAllocation {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveAllocation {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    /// Defaults to the allocated amount.
    pub approved_amount: Option<f64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectAllocation {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseAllocation (rejected → draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseAllocation {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BudgetAllocationCommand {
    CreateAllocation(CreateAllocation),
    UpdateAllocation(UpdateAllocation),
    SubmitAllocation(SubmitAllocation),
    ApproveAllocation(ApproveAllocation),
    RejectAllocation(RejectAllocation),
    ReviseAllocation(ReviseAllocation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationCreated {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub fiscal_year: String,
    pub department: String,
    pub budget_head_id: BudgetHeadId,
    pub head_type: HeadType,
    pub allocated_amount: f64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationUpdated {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub department: String,
    pub allocated_amount: f64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSubmitted {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationApproved {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub approved_amount: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRejected {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRevised {
    pub tenant_id: TenantId,
    pub allocation_id: BudgetAllocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BudgetAllocationEvent {
    AllocationCreated(AllocationCreated),
    AllocationUpdated(AllocationUpdated),
    AllocationSubmitted(AllocationSubmitted),
    AllocationApproved(AllocationApproved),
    AllocationRejected(AllocationRejected),
    AllocationRevised(AllocationRevised),
}

impl Event for BudgetAllocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BudgetAllocationEvent::AllocationCreated(_) => "budgeting.allocation.created",
            BudgetAllocationEvent::AllocationUpdated(_) => "budgeting.allocation.updated",
            BudgetAllocationEvent::AllocationSubmitted(_) => "budgeting.allocation.submitted",
            BudgetAllocationEvent::AllocationApproved(_) => "budgeting.allocation.approved",
            BudgetAllocationEvent::AllocationRejected(_) => "budgeting.allocation.rejected",
            BudgetAllocationEvent::AllocationRevised(_) => "budgeting.allocation.revised",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BudgetAllocationEvent::AllocationCreated(e) => e.occurred_at,
            BudgetAllocationEvent::AllocationUpdated(e) => e.occurred_at,
            BudgetAllocationEvent::AllocationSubmitted(e) => e.occurred_at,
            BudgetAllocationEvent::AllocationApproved(e) => e.occurred_at,
            BudgetAllocationEvent::AllocationRejected(e) => e.occurred_at,
            BudgetAllocationEvent::AllocationRevised(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BudgetAllocation {
    type Command = BudgetAllocationCommand;
    type Event = BudgetAllocationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BudgetAllocationEvent::AllocationCreated(e) => {
                self.id = e.allocation_id;
                self.tenant_id = Some(e.tenant_id);
                self.fiscal_year = e.fiscal_year.clone();
                self.department = e.department.clone();
                self.budget_head_id = Some(e.budget_head_id);
                self.head_type = e.head_type;
                self.allocated_amount = e.allocated_amount;
                self.approved_amount = None;
                self.notes = e.notes.clone();
                self.status = AllocationStatus::Draft;
                self.created = true;
            }
            BudgetAllocationEvent::AllocationUpdated(e) => {
                self.department = e.department.clone();
                self.allocated_amount = e.allocated_amount;
                self.notes = e.notes.clone();
            }
            BudgetAllocationEvent::AllocationSubmitted(_) => {
                self.status = AllocationStatus::Submitted;
            }
            BudgetAllocationEvent::AllocationApproved(e) => {
                self.approved_amount = Some(e.approved_amount);
                self.rejection_reason = None;
                self.status = AllocationStatus::Approved;
            }
            BudgetAllocationEvent::AllocationRejected(e) => {
                self.rejection_reason = Some(e.reason.clone());
                self.status = AllocationStatus::Rejected;
            }
            BudgetAllocationEvent::AllocationRevised(_) => {
                self.status = AllocationStatus::Draft;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BudgetAllocationCommand::CreateAllocation(cmd) => self.handle_create(cmd),
            BudgetAllocationCommand::UpdateAllocation(cmd) => self.handle_update(cmd),
            BudgetAllocationCommand::SubmitAllocation(cmd) => self.handle_submit(cmd),
            BudgetAllocationCommand::ApproveAllocation(cmd) => self.handle_approve(cmd),
            BudgetAllocationCommand::RejectAllocation(cmd) => self.handle_reject(cmd),
            BudgetAllocationCommand::ReviseAllocation(cmd) => self.handle_revise(cmd),
        }
    }
}

impl BudgetAllocation {
    fn ensure_existing(
        &self,
        tenant_id: TenantId,
        allocation_id: BudgetAllocationId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != allocation_id {
            return Err(DomainError::invariant("allocation_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: AllocationStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(format!(
                "cannot {action} an allocation in status {:?}",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateAllocation) -> Result<Vec<BudgetAllocationEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("budget allocation already exists"));
        }
        DomainError::require_text("fiscal_year", &cmd.fiscal_year)?;
        DomainError::require_text("department", &cmd.department)?;
        DomainError::require_non_negative("allocated_amount", cmd.allocated_amount)?;

        Ok(vec![BudgetAllocationEvent::AllocationCreated(AllocationCreated {
            tenant_id: cmd.tenant_id,
            allocation_id: cmd.allocation_id,
            fiscal_year: cmd.fiscal_year.trim().to_string(),
            department: cmd.department.trim().to_string(),
            budget_head_id: cmd.budget_head_id,
            head_type: cmd.head_type,
            allocated_amount: cmd.allocated_amount,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateAllocation) -> Result<Vec<BudgetAllocationEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.allocation_id)?;
        self.ensure_status(AllocationStatus::Draft, "edit")?;

        let department = cmd.department.clone().unwrap_or_else(|| self.department.clone());
        DomainError::require_text("department", &department)?;
        let allocated_amount = cmd.allocated_amount.unwrap_or(self.allocated_amount);
        DomainError::require_non_negative("allocated_amount", allocated_amount)?;

        Ok(vec![BudgetAllocationEvent::AllocationUpdated(AllocationUpdated {
            tenant_id: cmd.tenant_id,
            allocation_id: cmd.allocation_id,
            department: department.trim().to_string(),
            allocated_amount,
            notes: cmd.notes.clone().or_else(|| self.notes.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitAllocation) -> Result<Vec<BudgetAllocationEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.allocation_id)?;
        self.ensure_status(AllocationStatus::Draft, "submit")?;

        if self.allocated_amount <= 0.0 {
            return Err(DomainError::validation("allocated_amount must be positive to submit"));
        }

        Ok(vec![BudgetAllocationEvent::AllocationSubmitted(AllocationSubmitted {
            tenant_id: cmd.tenant_id,
            allocation_id: cmd.allocation_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveAllocation) -> Result<Vec<BudgetAllocationEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.allocation_id)?;
        self.ensure_status(AllocationStatus::Submitted, "approve")?;

        let approved_amount = cmd.approved_amount.unwrap_or(self.allocated_amount);
        DomainError::require_non_negative("approved_amount", approved_amount)?;

        Ok(vec![BudgetAllocationEvent::AllocationApproved(AllocationApproved {
            tenant_id: cmd.tenant_id,
            allocation_id: cmd.allocation_id,
            approved_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectAllocation) -> Result<Vec<BudgetAllocationEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.allocation_id)?;
        self.ensure_status(AllocationStatus::Submitted, "reject")?;
        DomainError::require_text("reason", &cmd.reason)?;

        Ok(vec![BudgetAllocationEvent::AllocationRejected(AllocationRejected {
            tenant_id: cmd.tenant_id,
            allocation_id: cmd.allocation_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseAllocation) -> Result<Vec<BudgetAllocationEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.allocation_id)?;
        self.ensure_status(AllocationStatus::Rejected, "revise")?;

        Ok(vec![BudgetAllocationEvent::AllocationRevised(AllocationRevised {
            tenant_id: cmd.tenant_id,
            allocation_id: cmd.allocation_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Build an allocation through its command path (test helper shared with `summary`).
#[cfg(test)]
pub(crate) fn test_allocation(
    tenant_id: TenantId,
    fiscal_year: &str,
    department: &str,
    head_type: HeadType,
    allocated: f64,
    approved: Option<f64>,
) -> BudgetAllocation {
    test_allocation_for_head(tenant_id, BudgetHeadId::generate(), fiscal_year, department, head_type, allocated, approved)
}

#[cfg(test)]
pub(crate) fn test_allocation_for_head(
    tenant_id: TenantId,
    budget_head_id: BudgetHeadId,
    fiscal_year: &str,
    department: &str,
    head_type: HeadType,
    allocated: f64,
    approved: Option<f64>,
) -> BudgetAllocation {
    let allocation_id = BudgetAllocationId::generate();
    let mut allocation = BudgetAllocation::empty(allocation_id);
    let mut commands = vec![BudgetAllocationCommand::CreateAllocation(CreateAllocation {
        tenant_id,
        allocation_id,
        fiscal_year: fiscal_year.to_string(),
        department: department.to_string(),
        budget_head_id,
        head_type,
        allocated_amount: allocated,
        notes: None,
        occurred_at: Utc::now(),
    })];
    if let Some(amount) = approved {
        commands.push(BudgetAllocationCommand::SubmitAllocation(SubmitAllocation {
            tenant_id,
            allocation_id,
            occurred_at: Utc::now(),
        }));
        commands.push(BudgetAllocationCommand::ApproveAllocation(ApproveAllocation {
            tenant_id,
            allocation_id,
            approved_amount: Some(amount),
            occurred_at: Utc::now(),
        }));
    }
    for command in commands {
        let events = allocation.handle(&command).unwrap();
        for event in &events {
            allocation.apply(event);
        }
    }
    allocation
}
