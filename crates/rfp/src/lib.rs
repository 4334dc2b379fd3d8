//! RFP domain module: solicitations, vendor responses, scoring criteria and
//! the evaluation ranking (QCBS / price L1 / technical L1).
//!
//! Pure domain logic only: no IO, no HTTP, no storage.

pub mod criteria;
pub mod evaluation;
pub mod response;
pub mod rfp;

pub use criteria::{CriterionCategory, CriterionId, CriterionMark, ScoringCriterion, technical_score_from_marks, validate_marks};
pub use evaluation::{
    Evaluation, EvaluationCriteria, EvaluationMethod, RankedResponse, Recommendation, ScoringInput,
    commercial_scores_from_prices, evaluate, final_score, rank_responses,
};
pub use response::{
    MarkAwarded, MarkRejected, ResponseItem, RfpResponse, RfpResponseCommand, RfpResponseEvent,
    RfpResponseId, RfpResponseStatus, ScoreResponse, SubmitResponse,
};
pub use rfp::{
    AwardRfp, CancelRfp, CloseRfp, CreateRfp, PublishRfp, RecordEvaluation, Rfp, RfpCommand,
    RfpEvent, RfpId, RfpStatus, UpdateRfp,
};
