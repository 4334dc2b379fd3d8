//! Evaluation ranking of vendor responses.
//!
//! One ranking function serves every caller (API evaluation view, the
//! recorded evaluation on the RFP, award checks).

use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult};

use crate::response::{RfpResponse, RfpResponseId};

/// How an RFP's responses are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    /// Quality and Cost Based Selection: weighted technical + commercial.
    Qcbs,
    /// Commercial score alone (scores already encode inverse price).
    PriceL1,
    /// Technical score alone.
    TechnicalL1,
}

/// `evaluation_criteria` column of an RFP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    #[serde(rename = "type")]
    pub method: EvaluationMethod,
    #[serde(default)]
    pub technical_weight: f64,
    #[serde(default)]
    pub commercial_weight: f64,
}

const WEIGHT_TOLERANCE: f64 = 1e-6;

impl EvaluationCriteria {
    pub fn qcbs(technical_weight: f64, commercial_weight: f64) -> Self {
        Self {
            method: EvaluationMethod::Qcbs,
            technical_weight,
            commercial_weight,
        }
    }

    pub fn price_l1() -> Self {
        Self {
            method: EvaluationMethod::PriceL1,
            technical_weight: 0.0,
            commercial_weight: 100.0,
        }
    }

    pub fn technical_l1() -> Self {
        Self {
            method: EvaluationMethod::TechnicalL1,
            technical_weight: 100.0,
            commercial_weight: 0.0,
        }
    }

    /// Weights are only meaningful for QCBS, where they must sum to 100.
    pub fn validate(&self) -> DomainResult<()> {
        if self.method != EvaluationMethod::Qcbs {
            return Ok(());
        }
        DomainError::require_percentage("technical_weight", self.technical_weight)?;
        DomainError::require_percentage("commercial_weight", self.commercial_weight)?;
        let sum = self.technical_weight + self.commercial_weight;
        if (sum - 100.0).abs() > WEIGHT_TOLERANCE {
            return Err(DomainError::validation(format!(
                "technical_weight + commercial_weight must equal 100 (got {sum})"
            )));
        }
        Ok(())
    }
}

/// Final score of one response under the given criteria.
pub fn final_score(criteria: &EvaluationCriteria, technical_score: f64, commercial_score: f64) -> f64 {
    match criteria.method {
        EvaluationMethod::Qcbs => {
            technical_score * criteria.technical_weight / 100.0
                + commercial_score * criteria.commercial_weight / 100.0
        }
        EvaluationMethod::PriceL1 => commercial_score,
        EvaluationMethod::TechnicalL1 => technical_score,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Recommended,
    SecondChoice,
    NotRecommended,
}

impl Recommendation {
    pub fn for_rank(rank: u32) -> Self {
        match rank {
            1 => Recommendation::Recommended,
            2 => Recommendation::SecondChoice,
            _ => Recommendation::NotRecommended,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::Recommended => "Recommended",
            Recommendation::SecondChoice => "Second Choice",
            Recommendation::NotRecommended => "Not Recommended",
        }
    }
}

/// A fully scored response fed into the ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringInput {
    pub response_id: RfpResponseId,
    pub vendor_name: String,
    pub technical_score: f64,
    pub commercial_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResponse {
    pub rank: u32,
    pub response_id: RfpResponseId,
    pub vendor_name: String,
    pub technical_score: f64,
    pub commercial_score: f64,
    pub final_score: f64,
    pub recommendation: Recommendation,
}

/// Rank inputs by descending final score.
///
/// The sort is stable: equal final scores keep their input order.
pub fn rank_responses(criteria: &EvaluationCriteria, inputs: &[ScoringInput]) -> Vec<RankedResponse> {
    let mut scored: Vec<(f64, &ScoringInput)> = inputs
        .iter()
        .map(|i| (final_score(criteria, i.technical_score, i.commercial_score), i))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(core::cmp::Ordering::Equal));

    scored
        .into_iter()
        .enumerate()
        .map(|(idx, (final_score, input))| {
            let rank = idx as u32 + 1;
            RankedResponse {
                rank,
                response_id: input.response_id,
                vendor_name: input.vendor_name.clone(),
                technical_score: input.technical_score,
                commercial_score: input.commercial_score,
                final_score,
                recommendation: Recommendation::for_rank(rank),
            }
        })
        .collect()
}

/// Result of evaluating an RFP's responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub method: EvaluationMethod,
    pub ranked: Vec<RankedResponse>,
    /// Responses still missing a technical or commercial score.
    pub unscored: Vec<RfpResponseId>,
}

impl Evaluation {
    pub fn recommended(&self) -> Option<&RankedResponse> {
        self.ranked.first()
    }
}

/// Rank every response that carries both scores; the rest are listed as unscored.
///
/// Withdrawn (rejected) responses take no part in the ranking.
pub fn evaluate(criteria: &EvaluationCriteria, responses: &[RfpResponse]) -> Evaluation {
    let mut inputs = Vec::new();
    let mut unscored = Vec::new();

    for response in responses.iter().filter(|r| r.is_rankable()) {
        match (response.technical_score(), response.commercial_score()) {
            (Some(technical_score), Some(commercial_score)) => inputs.push(ScoringInput {
                response_id: response.id_typed(),
                vendor_name: response.vendor_name().to_string(),
                technical_score,
                commercial_score,
            }),
            _ => unscored.push(response.id_typed()),
        }
    }

    Evaluation {
        method: criteria.method,
        ranked: rank_responses(criteria, &inputs),
        unscored,
    }
}

/// Standard QCBS financial score: `lowest / quoted * 100`.
///
/// Responses quoting zero or less are skipped (no meaningful price).
pub fn commercial_scores_from_prices(quotes: &[(RfpResponseId, f64)]) -> Vec<(RfpResponseId, f64)> {
    let lowest = quotes
        .iter()
        .map(|(_, total)| *total)
        .filter(|t| *t > 0.0 && t.is_finite())
        .fold(f64::INFINITY, f64::min);

    if !lowest.is_finite() {
        return Vec::new();
    }

    quotes
        .iter()
        .filter(|(_, total)| *total > 0.0 && total.is_finite())
        .map(|(id, total)| (*id, lowest / total * 100.0))
        .collect()
}
