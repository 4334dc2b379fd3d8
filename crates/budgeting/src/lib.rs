//! Budgeting domain module: budget heads, departmental allocations and the
//! summary/roll-up reductions over them.
//!
//! Pure domain logic only: no IO, no HTTP, no storage.

pub mod allocation;
pub mod head;
pub mod summary;

pub use allocation::{
    AllocationStatus, ApproveAllocation, BudgetAllocation, BudgetAllocationCommand,
    BudgetAllocationEvent, BudgetAllocationId, CreateAllocation, RejectAllocation,
    ReviseAllocation, SubmitAllocation, UpdateAllocation,
};
pub use head::{BudgetHead, BudgetHeadId, HeadType};
pub use summary::{BudgetSummary, DepartmentTotals, HeadRollup, StatusCounts, Totals, rollup_heads, summarize};
