use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query as QueryParams},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use procura_core::{Aggregate, DomainError, ExpectedVersion, TenantId};
use procura_infra::{Query, Versioned};
use procura_rfp::{
    AwardRfp, CancelRfp, CloseRfp, CreateRfp, CriterionId, Evaluation, MarkAwarded, MarkRejected,
    PublishRfp, RankedResponse, RecordEvaluation, ResponseItem, Rfp, RfpCommand, RfpId, RfpResponse,
    RfpResponseCommand, RfpResponseId, RfpResponseStatus, RfpStatus, ScoreResponse, ScoringCriterion,
    SubmitResponse, UpdateRfp, commercial_scores_from_prices, evaluate, technical_score_from_marks, validate_marks,
};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rfps).post(create_rfp))
        .route("/:id", get(get_rfp).put(update_rfp).delete(delete_rfp))
        .route("/:id/publish", post(publish_rfp))
        .route("/:id/close", post(close_rfp))
        .route("/:id/cancel", post(cancel_rfp))
        .route("/:id/award", post(award_rfp))
        .route("/:id/criteria", get(list_criteria).post(add_criterion))
        .route("/:id/criteria/:criterion_id", delete(remove_criterion))
        .route("/:id/responses", get(list_responses).post(submit_response))
        .route("/:id/responses/:response_id", get(get_response))
        .route("/:id/responses/:response_id/score", post(score_response))
        .route("/:id/evaluation", get(get_evaluation).post(record_evaluation))
        .route("/:id/evaluation/price-scores", post(apply_price_scores))
}

// -------------------------
// RFPs
// -------------------------

pub async fn list_rfps(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::ListParams>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.read")?;
    let rfps = services
        .list::<Rfp>(tenant.tenant_id(), &params.query())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&rfps))
}

pub async fn create_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateRfpRequest>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let tenant_id = tenant.tenant_id();
    let rfp_id = RfpId::generate();

    let now = Utc::now();
    let rfp_number = body
        .rfp_number
        .unwrap_or_else(|| format!("RFP-{}", now.format("%Y%m%d%H%M%S%3f")));

    let command = RfpCommand::CreateRfp(CreateRfp {
        tenant_id,
        rfp_id,
        rfp_number,
        title: body.title,
        description: body.description,
        submission_deadline: body.submission_deadline,
        estimated_budget: body.estimated_budget,
        evaluation_criteria: body.evaluation_criteria,
        occurred_at: now,
    });
    let record = dispatch_rfp(&services, tenant_id, rfp_id, command).await?;
    Ok(dto::created(&record))
}

pub async fn get_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.read")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;

    let rfp = load_rfp(&services, tenant.tenant_id(), rfp_id).await?;
    Ok(dto::ok(&rfp))
}

pub async fn update_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateRfpRequest>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;

    let command = RfpCommand::UpdateRfp(UpdateRfp {
        tenant_id: tenant.tenant_id(),
        rfp_id,
        title: body.title,
        description: body.description,
        submission_deadline: body.submission_deadline,
        estimated_budget: body.estimated_budget,
        evaluation_criteria: body.evaluation_criteria,
        occurred_at: Utc::now(),
    });
    let record = dispatch_rfp(&services, tenant.tenant_id(), rfp_id, command).await?;
    Ok(dto::ok(&record))
}

/// Drafts only, together with their scoring criteria.
pub async fn delete_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?;
    if rfp.record.status() != RfpStatus::Draft {
        return Err(errors::domain_error_to_response(DomainError::invariant(
            "only draft RFPs can be deleted",
        )));
    }

    for criterion in criteria_of(&services, tenant_id, rfp_id).await? {
        services
            .remove::<ScoringCriterion>(tenant_id, criterion.id.record_id())
            .await
            .map_err(errors::dispatch_error_to_response)?;
    }
    services
        .remove::<Rfp>(tenant_id, rfp_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn publish_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;

    let command = RfpCommand::PublishRfp(PublishRfp {
        tenant_id: tenant.tenant_id(),
        rfp_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_rfp(&services, tenant.tenant_id(), rfp_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn close_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;

    let command = RfpCommand::CloseRfp(CloseRfp {
        tenant_id: tenant.tenant_id(),
        rfp_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_rfp(&services, tenant.tenant_id(), rfp_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn cancel_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let command = RfpCommand::CancelRfp(CancelRfp {
        tenant_id: tenant.tenant_id(),
        rfp_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let record = dispatch_rfp(&services, tenant.tenant_id(), rfp_id, command).await?;
    Ok(dto::ok(&record))
}

/// Award the RFP, then mark the winning response awarded and the other
/// live responses rejected. The RFP row is authoritative; a failure on a
/// response row is logged and left for a retry of that response.
pub async fn award_rfp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AwardRequest>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.award")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let tenant_id = tenant.tenant_id();

    let winner = body.response_id;
    let award = RfpCommand::AwardRfp(AwardRfp {
        tenant_id,
        rfp_id,
        response_id: winner,
        occurred_at: Utc::now(),
    });
    // The winner is marked before the RFP row moves to Awarded, so the award
    // is checked against the current RFP first.
    let current = load_rfp(&services, tenant_id, rfp_id).await?;
    current.record.handle(&award).map_err(errors::domain_error_to_response)?;

    // Already awarded when an earlier attempt stopped before the RFP write.
    let winning = load_response(&services, tenant_id, rfp_id, winner).await?;
    if winning.record.status() != RfpResponseStatus::Awarded {
        let command = RfpResponseCommand::MarkAwarded(MarkAwarded {
            tenant_id,
            response_id: winner,
            occurred_at: Utc::now(),
        });
        dispatch_response(&services, tenant_id, winner, command).await?;
    }

    let record = match dispatch_rfp(&services, tenant_id, rfp_id, award).await {
        Ok(record) => record,
        Err(response) => {
            tracing::error!(
                tenant_id = %tenant_id,
                rfp_id = %rfp_id,
                response_id = %winner,
                "response marked awarded but the rfp award failed; retry the award"
            );
            return Err(response);
        }
    };

    for response in responses_of(&services, tenant_id, rfp_id).await? {
        let response_id = response.id_typed();
        if response_id == winner
            || !matches!(response.status(), RfpResponseStatus::Submitted | RfpResponseStatus::Evaluated)
        {
            continue;
        }
        let command = RfpResponseCommand::MarkRejected(MarkRejected {
            tenant_id,
            response_id,
            reason: Some("not selected".to_string()),
            occurred_at: Utc::now(),
        });
        if dispatch_response(&services, tenant_id, response_id, command).await.is_err() {
            tracing::warn!(tenant_id = %tenant_id, rfp_id = %rfp_id, response_id = %response_id, "could not reject losing response");
        }
    }

    Ok(dto::ok(&record))
}

async fn load_rfp(services: &AppServices, tenant_id: TenantId, rfp_id: RfpId) -> Result<Versioned<Rfp>, Response> {
    services
        .find::<Rfp>(tenant_id, rfp_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?
        .ok_or_else(|| errors::not_found("rfp"))
}

async fn dispatch_rfp(
    services: &AppServices,
    tenant_id: TenantId,
    rfp_id: RfpId,
    command: RfpCommand,
) -> Result<Versioned<Rfp>, Response> {
    services
        .dispatch::<Rfp>(tenant_id, rfp_id.record_id(), command, |_t, record_id| {
            Rfp::empty(RfpId::new(record_id))
        })
        .await
        .map(|dispatched| dispatched.record)
        .map_err(errors::dispatch_error_to_response)
}

// -------------------------
// Scoring criteria
// -------------------------

pub async fn list_criteria(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.read")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;

    load_rfp(&services, tenant.tenant_id(), rfp_id).await?;
    let criteria = criteria_of(&services, tenant.tenant_id(), rfp_id).await?;
    Ok(dto::items(&criteria))
}

pub async fn add_criterion(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CriterionRequest>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?;
    ensure_criteria_editable(&rfp.record)?;

    let criterion = ScoringCriterion {
        id: CriterionId::generate(),
        tenant_id,
        rfp_id,
        name: body.name.trim().to_string(),
        description: body.description,
        category: body.category,
        max_score: body.max_score,
        weight: body.weight,
    };
    criterion.validate().map_err(errors::domain_error_to_response)?;

    let saved = services
        .save(tenant_id, criterion, ExpectedVersion::NoRecord)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::created(&saved))
}

pub async fn remove_criterion(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, criterion_id)): Path<(String, String)>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let criterion_id: CriterionId = parse_id(&criterion_id, "criterion")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?;
    ensure_criteria_editable(&rfp.record)?;

    let criterion = services
        .find::<ScoringCriterion>(tenant_id, criterion_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?
        .filter(|c| c.record.rfp_id == rfp_id)
        .ok_or_else(|| errors::not_found("criterion"))?;

    services
        .remove::<ScoringCriterion>(tenant_id, criterion.record.id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn ensure_criteria_editable(rfp: &Rfp) -> Result<(), Response> {
    if matches!(rfp.status(), RfpStatus::Draft | RfpStatus::Published) {
        return Ok(());
    }
    Err(errors::domain_error_to_response(DomainError::invariant(format!(
        "criteria are frozen once an RFP is {:?}",
        rfp.status()
    ))))
}

async fn criteria_of(
    services: &AppServices,
    tenant_id: TenantId,
    rfp_id: RfpId,
) -> Result<Vec<ScoringCriterion>, Response> {
    services
        .records::<ScoringCriterion>(tenant_id, &Query::new().eq("rfp_id", rfp_id.to_string()))
        .await
        .map_err(errors::dispatch_error_to_response)
}

// -------------------------
// Vendor responses
// -------------------------

pub async fn list_responses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.read")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;

    load_rfp(&services, tenant.tenant_id(), rfp_id).await?;
    let responses = services
        .list::<RfpResponse>(
            tenant.tenant_id(),
            &Query::new().eq("rfp_id", rfp_id.to_string()).order_by("created_at", false),
        )
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&responses))
}

/// Accepted only while the RFP is published and before its deadline.
pub async fn submit_response(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SubmitResponseRequest>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.write")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?.into_inner();
    let now = Utc::now();

    let response_id = RfpResponseId::generate();
    let command = RfpResponseCommand::SubmitResponse(SubmitResponse {
        tenant_id,
        response_id,
        rfp_id,
        rfp_status: rfp.status(),
        rfp_deadline: rfp.submission_deadline().unwrap_or(now),
        vendor_id: body.vendor_id,
        vendor_name: body.vendor_name,
        items: body
            .items
            .into_iter()
            .map(|item| ResponseItem {
                line_no: 0,
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
        occurred_at: now,
    });
    let record = dispatch_response(&services, tenant_id, response_id, command).await?;
    Ok(dto::created(&record))
}

pub async fn get_response(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, response_id)): Path<(String, String)>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.read")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let response_id: RfpResponseId = parse_id(&response_id, "response")?;

    let response = load_response(&services, tenant.tenant_id(), rfp_id, response_id).await?;
    Ok(dto::ok(&response))
}

/// Record scores. Without an explicit `technical_score`, criterion marks
/// are turned into one using the RFP's technical criteria.
pub async fn score_response(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, response_id)): Path<(String, String)>,
    Json(body): Json<dto::ScoreRequest>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.evaluate")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let response_id: RfpResponseId = parse_id(&response_id, "response")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?;
    ensure_scoring_open(&rfp.record)?;
    load_response(&services, tenant_id, rfp_id, response_id).await?;

    let mut technical_score = body.technical_score;
    if !body.criterion_marks.is_empty() {
        let criteria = criteria_of(&services, tenant_id, rfp_id).await?;
        validate_marks(&criteria, &body.criterion_marks).map_err(errors::domain_error_to_response)?;
        if technical_score.is_none() {
            technical_score = Some(
                technical_score_from_marks(&criteria, &body.criterion_marks)
                    .map_err(errors::domain_error_to_response)?,
            );
        }
    }

    let command = RfpResponseCommand::ScoreResponse(ScoreResponse {
        tenant_id,
        response_id,
        technical_score,
        commercial_score: body.commercial_score,
        criterion_marks: body.criterion_marks,
        occurred_at: Utc::now(),
    });
    let record = dispatch_response(&services, tenant_id, response_id, command).await?;
    Ok(dto::ok(&record))
}

fn ensure_scoring_open(rfp: &Rfp) -> Result<(), Response> {
    if matches!(rfp.status(), RfpStatus::Published | RfpStatus::Closed) {
        return Ok(());
    }
    Err(errors::domain_error_to_response(DomainError::invariant(format!(
        "responses cannot be scored while the RFP is {:?}",
        rfp.status()
    ))))
}

async fn load_response(
    services: &AppServices,
    tenant_id: TenantId,
    rfp_id: RfpId,
    response_id: RfpResponseId,
) -> Result<Versioned<RfpResponse>, Response> {
    services
        .find::<RfpResponse>(tenant_id, response_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?
        .filter(|r| r.record.rfp_id() == Some(rfp_id))
        .ok_or_else(|| errors::not_found("response"))
}

async fn responses_of(
    services: &AppServices,
    tenant_id: TenantId,
    rfp_id: RfpId,
) -> Result<Vec<RfpResponse>, Response> {
    services
        .records::<RfpResponse>(
            tenant_id,
            &Query::new().eq("rfp_id", rfp_id.to_string()).order_by("created_at", false),
        )
        .await
        .map_err(errors::dispatch_error_to_response)
}

async fn dispatch_response(
    services: &AppServices,
    tenant_id: TenantId,
    response_id: RfpResponseId,
    command: RfpResponseCommand,
) -> Result<Versioned<RfpResponse>, Response> {
    services
        .dispatch::<RfpResponse>(tenant_id, response_id.record_id(), command, |_t, record_id| {
            RfpResponse::empty(RfpResponseId::new(record_id))
        })
        .await
        .map(|dispatched| dispatched.record)
        .map_err(errors::dispatch_error_to_response)
}

// -------------------------
// Evaluation
// -------------------------

#[derive(Debug, Serialize)]
struct EvaluationView<'a> {
    #[serde(flatten)]
    current: Evaluation,
    /// Ranking stored on the RFP when the evaluation was recorded.
    recorded: &'a [RankedResponse],
}

/// Live ranking of the current scores, next to the recorded one.
pub async fn get_evaluation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.read")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?.into_inner();
    let responses = responses_of(&services, tenant_id, rfp_id).await?;

    Ok(dto::ok(&EvaluationView {
        current: evaluate(rfp.evaluation_criteria(), &responses),
        recorded: rfp.evaluation(),
    }))
}

/// Rank the scored responses of a closed RFP and store the ranking.
pub async fn record_evaluation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.evaluate")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?.into_inner();
    let responses = responses_of(&services, tenant_id, rfp_id).await?;
    let evaluation = evaluate(rfp.evaluation_criteria(), &responses);
    if !evaluation.unscored.is_empty() {
        tracing::warn!(tenant_id = %tenant_id, rfp_id = %rfp_id, unscored = evaluation.unscored.len(), "recording evaluation with unscored responses");
    }

    let command = RfpCommand::RecordEvaluation(RecordEvaluation {
        tenant_id,
        rfp_id,
        ranking: evaluation.ranked,
        occurred_at: Utc::now(),
    });
    let record = dispatch_rfp(&services, tenant_id, rfp_id, command).await?;
    Ok(dto::ok(&record))
}

/// Derive every live response's commercial score from its quoted total
/// (`lowest / total * 100`).
pub async fn apply_price_scores(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "rfps.evaluate")?;
    let rfp_id: RfpId = parse_id(&id, "rfp")?;
    let tenant_id = tenant.tenant_id();

    let rfp = load_rfp(&services, tenant_id, rfp_id).await?;
    ensure_scoring_open(&rfp.record)?;

    let quotes: Vec<(RfpResponseId, f64)> = responses_of(&services, tenant_id, rfp_id)
        .await?
        .iter()
        .filter(|r| r.is_rankable())
        .map(|r| (r.id_typed(), r.total_amount()))
        .collect();

    let mut scored = Vec::new();
    for (response_id, score) in commercial_scores_from_prices(&quotes) {
        let command = RfpResponseCommand::ScoreResponse(ScoreResponse {
            tenant_id,
            response_id,
            technical_score: None,
            commercial_score: Some(score),
            criterion_marks: Vec::new(),
            occurred_at: Utc::now(),
        });
        scored.push(dispatch_response(&services, tenant_id, response_id, command).await?);
    }

    Ok(dto::items(&scored))
}
