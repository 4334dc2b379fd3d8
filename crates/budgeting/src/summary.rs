//! Budget summary and head roll-up reductions.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::allocation::{AllocationStatus, BudgetAllocation};
use crate::head::{BudgetHead, BudgetHeadId, HeadType};

/// Allocated/approved pair with derived utilization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub allocated: f64,
    pub approved: f64,
}

impl Totals {
    fn add(&mut self, allocation: &BudgetAllocation) {
        self.allocated += allocation.allocated_amount();
        self.approved += allocation.approved_amount().unwrap_or(0.0);
    }

    /// `approved / allocated * 100`, 0 when nothing is allocated.
    pub fn utilization(&self) -> f64 {
        if self.allocated > 0.0 {
            self.approved / self.allocated * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentTotals {
    pub department: String,
    pub allocated: f64,
    pub approved: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub submitted: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.draft + self.submitted + self.approved + self.rejected
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub fiscal_year: Option<String>,
    pub allocation_count: usize,
    pub total_allocated: f64,
    pub total_approved: f64,
    pub utilization: f64,
    /// Sorted by department name.
    pub by_department: Vec<DepartmentTotals>,
    pub income: Totals,
    pub expenditure: Totals,
    pub status_counts: StatusCounts,
}

/// Reduce allocations to the dashboard summary, optionally restricted to one fiscal year.
pub fn summarize(allocations: &[BudgetAllocation], fiscal_year: Option<&str>) -> BudgetSummary {
    let mut overall = Totals::default();
    let mut income = Totals::default();
    let mut expenditure = Totals::default();
    let mut departments: BTreeMap<&str, Totals> = BTreeMap::new();
    let mut status_counts = StatusCounts::default();
    let mut allocation_count = 0;

    for allocation in allocations
        .iter()
        .filter(|a| fiscal_year.is_none_or(|fy| a.fiscal_year() == fy))
    {
        allocation_count += 1;
        overall.add(allocation);
        match allocation.head_type() {
            HeadType::Income => income.add(allocation),
            HeadType::Expenditure => expenditure.add(allocation),
        }
        departments.entry(allocation.department()).or_default().add(allocation);
        match allocation.status() {
            AllocationStatus::Draft => status_counts.draft += 1,
            AllocationStatus::Submitted => status_counts.submitted += 1,
            AllocationStatus::Approved => status_counts.approved += 1,
            AllocationStatus::Rejected => status_counts.rejected += 1,
        }
    }

    BudgetSummary {
        fiscal_year: fiscal_year.map(str::to_string),
        allocation_count,
        total_allocated: overall.allocated,
        total_approved: overall.approved,
        utilization: overall.utilization(),
        by_department: departments
            .into_iter()
            .map(|(department, totals)| DepartmentTotals {
                department: department.to_string(),
                allocated: totals.allocated,
                approved: totals.approved,
                utilization: totals.utilization(),
            })
            .collect(),
        income,
        expenditure,
        status_counts,
    }
}

/// One head's own totals plus everything booked under its descendants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadRollup {
    pub head_id: BudgetHeadId,
    pub name: String,
    pub code: String,
    pub head_type: HeadType,
    pub parent_id: Option<BudgetHeadId>,
    pub depth: usize,
    pub own: Totals,
    pub total: Totals,
}

/// Roll allocations up the head hierarchy.
///
/// Output is depth-first, siblings ordered by `(head_type, display_order)`.
/// Heads whose parent is missing are treated as roots.
pub fn rollup_heads(heads: &[BudgetHead], allocations: &[BudgetAllocation]) -> Vec<HeadRollup> {
    let mut own: HashMap<BudgetHeadId, Totals> = HashMap::new();
    for allocation in allocations {
        if let Some(head_id) = allocation.budget_head_id() {
            own.entry(head_id).or_default().add(allocation);
        }
    }

    let known: HashMap<BudgetHeadId, &BudgetHead> = heads.iter().map(|h| (h.id, h)).collect();
    let mut children: HashMap<Option<BudgetHeadId>, Vec<&BudgetHead>> = HashMap::new();
    for head in heads {
        let parent = head.parent_id.filter(|p| known.contains_key(p));
        children.entry(parent).or_default().push(head);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|h| (h.head_type, h.display_order));
    }

    let mut out = Vec::with_capacity(heads.len());
    if let Some(roots) = children.get(&None) {
        for root in roots {
            visit(root, 0, &children, &own, &mut out);
        }
    }
    out
}

fn visit(
    head: &BudgetHead,
    depth: usize,
    children: &HashMap<Option<BudgetHeadId>, Vec<&BudgetHead>>,
    own: &HashMap<BudgetHeadId, Totals>,
    out: &mut Vec<HeadRollup>,
) -> Totals {
    let own_totals = own.get(&head.id).copied().unwrap_or_default();
    let slot = out.len();
    out.push(HeadRollup {
        head_id: head.id,
        name: head.name.clone(),
        code: head.code.clone(),
        head_type: head.head_type,
        parent_id: head.parent_id,
        depth,
        own: own_totals,
        total: own_totals,
    });

    let mut total = own_totals;
    if let Some(kids) = children.get(&Some(head.id)) {
        for kid in kids {
            let sub = visit(kid, depth + 1, children, own, out);
            total.allocated += sub.allocated;
            total.approved += sub.approved;
        }
    }
    out[slot].total = total;
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{test_allocation, test_allocation_for_head};
    use crate::head::test_head;
    use pretty_assertions::assert_eq;
    use procura_core::{TenantId, approx_eq};
    use proptest::prelude::*;

    #[test]
    fn groups_by_department_and_head_type() {
        let t = TenantId::new();
        let allocations = vec![
            test_allocation(t, "2026", "IT", HeadType::Expenditure, 1000.0, Some(800.0)),
            test_allocation(t, "2026", "IT", HeadType::Expenditure, 500.0, None),
            test_allocation(t, "2026", "Admin", HeadType::Income, 300.0, Some(300.0)),
            test_allocation(t, "2025", "IT", HeadType::Expenditure, 9999.0, Some(9999.0)),
        ];

        let summary = summarize(&allocations, Some("2026"));

        assert_eq!(summary.allocation_count, 3);
        assert_eq!(summary.total_allocated, 1800.0);
        assert_eq!(summary.total_approved, 1100.0);
        assert_eq!(summary.by_department.len(), 2);
        assert_eq!(summary.by_department[0].department, "Admin");
        assert_eq!(summary.by_department[1].allocated, 1500.0);
        assert_eq!(summary.income, Totals { allocated: 300.0, approved: 300.0 });
        assert_eq!(summary.expenditure, Totals { allocated: 1500.0, approved: 800.0 });
        assert_eq!(summary.status_counts, StatusCounts { draft: 1, submitted: 0, approved: 2, rejected: 0 });
        assert!((summary.utilization - 1100.0 / 1800.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_summary_has_zero_utilization() {
        let summary = summarize(&[], None);
        assert_eq!(summary.allocation_count, 0);
        assert_eq!(summary.utilization, 0.0);
        assert!(summary.by_department.is_empty());
    }

    #[test]
    fn rollup_accumulates_descendants() {
        let t = TenantId::new();
        let mut root = test_head(t, HeadType::Expenditure, None);
        root.name = "Operations".to_string();
        let mut it = test_head(t, HeadType::Expenditure, Some(root.id));
        it.display_order = 1;
        let mut facilities = test_head(t, HeadType::Expenditure, Some(root.id));
        facilities.display_order = 2;
        let hardware = test_head(t, HeadType::Expenditure, Some(it.id));

        let allocations = vec![
            test_allocation_for_head(t, root.id, "2026", "Ops", HeadType::Expenditure, 100.0, None),
            test_allocation_for_head(t, it.id, "2026", "IT", HeadType::Expenditure, 200.0, Some(150.0)),
            test_allocation_for_head(t, hardware.id, "2026", "IT", HeadType::Expenditure, 300.0, Some(300.0)),
            test_allocation_for_head(t, facilities.id, "2026", "Fac", HeadType::Expenditure, 50.0, None),
        ];

        let rollup = rollup_heads(&[hardware.clone(), facilities.clone(), it.clone(), root.clone()], &allocations);

        let order: Vec<_> = rollup.iter().map(|r| (r.head_id, r.depth)).collect();
        assert_eq!(order, vec![(root.id, 0), (it.id, 1), (hardware.id, 2), (facilities.id, 1)]);
        assert_eq!(rollup[0].own.allocated, 100.0);
        assert_eq!(rollup[0].total, Totals { allocated: 650.0, approved: 450.0 });
        assert_eq!(rollup[1].total, Totals { allocated: 500.0, approved: 450.0 });
    }

    fn arb_allocation() -> impl Strategy<Value = (String, bool, f64, Option<f64>)> {
        (
            prop::sample::select(vec!["IT", "Admin", "Facilities", "HR"]),
            any::<bool>(),
            1.0f64..100_000.0,
            prop::option::of(0.0f64..100_000.0),
        )
            .prop_map(|(d, income, alloc, appr)| (d.to_string(), income, alloc, appr))
    }

    proptest! {
        #[test]
        fn group_sums_equal_overall_sums(rows in prop::collection::vec(arb_allocation(), 0..30)) {
            let t = TenantId::new();
            let allocations: Vec<_> = rows
                .iter()
                .map(|(d, income, alloc, appr)| {
                    let head_type = if *income { HeadType::Income } else { HeadType::Expenditure };
                    test_allocation(t, "2026", d, head_type, *alloc, *appr)
                })
                .collect();

            let summary = summarize(&allocations, None);

            let dept_allocated: f64 = summary.by_department.iter().map(|d| d.allocated).sum();
            let dept_approved: f64 = summary.by_department.iter().map(|d| d.approved).sum();
            prop_assert!(approx_eq(dept_allocated, summary.total_allocated));
            prop_assert!(approx_eq(dept_approved, summary.total_approved));
            prop_assert!(approx_eq(summary.income.allocated + summary.expenditure.allocated, summary.total_allocated));
            prop_assert!(approx_eq(summary.income.approved + summary.expenditure.approved, summary.total_approved));
            prop_assert_eq!(summary.status_counts.total(), allocations.len());
        }
    }
}
