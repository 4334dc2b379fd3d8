//! Budget heads: the chart of income/expenditure lines allocations are booked against.

use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, Entity, RecordId, TableBacked, TenantId};

procura_core::record_id!(BudgetHeadId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadType {
    Income,
    Expenditure,
}

impl HeadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadType::Income => "income",
            HeadType::Expenditure => "expenditure",
        }
    }
}

/// A budget head row (`budget_heads`).
///
/// `display_order` is unique per tenant and head type; the record store
/// enforces that constraint atomically on insert/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetHead {
    pub id: BudgetHeadId,
    pub tenant_id: TenantId,
    pub name: String,
    pub code: String,
    pub head_type: HeadType,
    #[serde(default)]
    pub parent_id: Option<BudgetHeadId>,
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl BudgetHead {
    /// Field-level checks that need no other rows.
    pub fn validate(&self) -> DomainResult<()> {
        DomainError::require_text("name", &self.name)?;
        DomainError::require_text("code", &self.code)?;
        if self.display_order < 0 {
            return Err(DomainError::validation("display_order must be non-negative"));
        }
        if self.parent_id == Some(self.id) {
            return Err(DomainError::invariant("a budget head cannot be its own parent"));
        }
        Ok(())
    }

    /// Check the parent link against the tenant's existing heads: the parent
    /// must exist, share the head type, and not descend from `self`.
    pub fn validate_parent(&self, existing: &[BudgetHead]) -> DomainResult<()> {
        let Some(parent_id) = self.parent_id else {
            return Ok(());
        };

        let parent = existing
            .iter()
            .find(|h| h.id == parent_id)
            .ok_or_else(|| DomainError::validation("parent budget head does not exist"))?;

        if parent.head_type != self.head_type {
            return Err(DomainError::invariant(
                "parent budget head must have the same head_type",
            ));
        }

        // Walk up from the parent; reaching `self` means a cycle.
        let mut cursor = Some(parent_id);
        let mut steps = 0usize;
        while let Some(current) = cursor {
            if current == self.id {
                return Err(DomainError::invariant("budget head hierarchy cannot contain cycles"));
            }
            steps += 1;
            if steps > existing.len() {
                return Err(DomainError::invariant("budget head hierarchy cannot contain cycles"));
            }
            cursor = existing.iter().find(|h| h.id == current).and_then(|h| h.parent_id);
        }

        Ok(())
    }
}

impl Entity for BudgetHead {
    type Id = BudgetHeadId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TableBacked for BudgetHead {
    const TABLE: &'static str = "budget_heads";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

#[cfg(test)]
pub(crate) fn test_head(tenant_id: TenantId, head_type: HeadType, parent_id: Option<BudgetHeadId>) -> BudgetHead {
    BudgetHead {
        id: BudgetHeadId::generate(),
        tenant_id,
        name: "Head".to_string(),
        code: "H".to_string(),
        head_type,
        parent_id,
        display_order: 0,
        is_active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_must_exist_and_match_type() {
        let tenant = TenantId::new();
        let income = test_head(tenant, HeadType::Income, None);

        let orphan = test_head(tenant, HeadType::Income, Some(BudgetHeadId::generate()));
        assert!(matches!(
            orphan.validate_parent(std::slice::from_ref(&income)),
            Err(DomainError::Validation(_))
        ));

        let mismatched = test_head(tenant, HeadType::Expenditure, Some(income.id));
        assert!(matches!(
            mismatched.validate_parent(std::slice::from_ref(&income)),
            Err(DomainError::InvariantViolation(_))
        ));

        let child = test_head(tenant, HeadType::Income, Some(income.id));
        assert!(child.validate_parent(&[income]).is_ok());
    }

    #[test]
    fn reparenting_under_a_descendant_is_a_cycle() {
        let tenant = TenantId::new();
        let root = test_head(tenant, HeadType::Expenditure, None);
        let child = test_head(tenant, HeadType::Expenditure, Some(root.id));
        let grandchild = test_head(tenant, HeadType::Expenditure, Some(child.id));

        let mut moved_root = root.clone();
        moved_root.parent_id = Some(grandchild.id);

        let err = moved_root
            .validate_parent(&[root, child, grandchild])
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("cycles")));
    }

    #[test]
    fn self_parent_is_rejected_by_validate() {
        let mut head = test_head(TenantId::new(), HeadType::Income, None);
        head.parent_id = Some(head.id);
        assert!(head.validate().is_err());
    }

    #[test]
    fn head_type_serializes_lowercase() {
        assert_eq!(HeadType::Expenditure.as_str(), "expenditure");
    }
}
