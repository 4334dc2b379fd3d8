//! Scoring criteria (`rfp_scoring_criteria`) and criterion-based technical scores.

use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, Entity, RecordId, TableBacked, TenantId};

use crate::rfp::RfpId;

procura_core::record_id!(CriterionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionCategory {
    Technical,
    Commercial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringCriterion {
    pub id: CriterionId,
    pub tenant_id: TenantId,
    pub rfp_id: RfpId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: CriterionCategory,
    pub max_score: f64,
    /// Relative weight inside its category.
    pub weight: f64,
}

impl ScoringCriterion {
    pub fn validate(&self) -> DomainResult<()> {
        DomainError::require_text("name", &self.name)?;
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(DomainError::validation("max_score must be positive"));
        }
        DomainError::require_percentage("weight", self.weight)?;
        Ok(())
    }
}

impl Entity for ScoringCriterion {
    type Id = CriterionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TableBacked for ScoringCriterion {
    const TABLE: &'static str = "rfp_scoring_criteria";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// An evaluator's mark against one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionMark {
    pub criterion_id: CriterionId,
    pub mark: f64,
}

/// Every mark must name one of `criteria`, at most once, and lie in
/// `0..=max_score` of that criterion.
pub fn validate_marks(criteria: &[ScoringCriterion], marks: &[CriterionMark]) -> DomainResult<()> {
    for (idx, mark) in marks.iter().enumerate() {
        let criterion = criteria
            .iter()
            .find(|c| c.id == mark.criterion_id)
            .ok_or_else(|| DomainError::validation(format!("unknown criterion {}", mark.criterion_id)))?;

        if marks[..idx].iter().any(|m| m.criterion_id == mark.criterion_id) {
            return Err(DomainError::validation(format!(
                "criterion '{}' is marked more than once",
                criterion.name
            )));
        }
        if !mark.mark.is_finite() || mark.mark < 0.0 || mark.mark > criterion.max_score {
            return Err(DomainError::validation(format!(
                "mark for '{}' must be between 0 and {}",
                criterion.name, criterion.max_score
            )));
        }
    }
    Ok(())
}

/// Weighted technical score (0–100) from per-criterion marks.
///
/// `Σ(mark / max_score * weight) / Σ weight * 100` over technical criteria.
/// Every technical criterion needs a mark; commercial criteria are ignored.
pub fn technical_score_from_marks(
    criteria: &[ScoringCriterion],
    marks: &[CriterionMark],
) -> DomainResult<f64> {
    let technical: Vec<&ScoringCriterion> = criteria
        .iter()
        .filter(|c| c.category == CriterionCategory::Technical)
        .collect();

    let total_weight: f64 = technical.iter().map(|c| c.weight).sum();
    if technical.is_empty() || total_weight <= 0.0 {
        return Err(DomainError::validation("no weighted technical criteria defined"));
    }

    validate_marks(criteria, marks)?;

    let mut weighted = 0.0;
    for criterion in technical {
        let mark = marks
            .iter()
            .find(|m| m.criterion_id == criterion.id)
            .ok_or_else(|| DomainError::validation(format!("missing mark for criterion '{}'", criterion.name)))?;
        weighted += mark.mark / criterion.max_score * criterion.weight;
    }

    Ok(weighted / total_weight * 100.0)
}
