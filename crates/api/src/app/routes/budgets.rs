use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query as QueryParams},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procura_budgeting::{
    AllocationStatus, ApproveAllocation, BudgetAllocation, BudgetAllocationCommand, BudgetAllocationId,
    BudgetHead, BudgetHeadId, CreateAllocation, RejectAllocation, ReviseAllocation, SubmitAllocation,
    UpdateAllocation, rollup_heads, summarize,
};
use procura_core::{DomainError, ExpectedVersion, TenantId};
use procura_infra::{Query, Versioned};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{expected_version, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/heads", get(list_heads).post(create_head))
        .route("/heads/rollup", get(head_rollup))
        .route("/heads/:id", get(get_head).put(update_head).delete(delete_head))
        .route("/allocations", get(list_allocations).post(create_allocation))
        .route(
            "/allocations/:id",
            get(get_allocation).put(update_allocation).delete(delete_allocation),
        )
        .route("/allocations/:id/submit", post(submit_allocation))
        .route("/allocations/:id/approve", post(approve_allocation))
        .route("/allocations/:id/reject", post(reject_allocation))
        .route("/allocations/:id/revise", post(revise_allocation))
        .route("/summary", get(budget_summary))
}

// -------------------------
// Budget heads
// -------------------------

pub async fn list_heads(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::HeadListParams>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.read")?;

    let mut query = Query::new().order_by("head_type", false).order_by("display_order", false);
    if let Some(head_type) = params.head_type {
        query = query.eq("head_type", head_type.as_str());
    }
    if !params.include_inactive {
        query = query.eq("is_active", true);
    }

    let heads = services
        .list::<BudgetHead>(tenant.tenant_id(), &query)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&heads))
}

pub async fn create_head(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::BudgetHeadRequest>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;

    let head = head_from_request(BudgetHeadId::generate(), tenant.tenant_id(), body);
    check_head(&services, tenant.tenant_id(), &head).await?;

    let saved = services
        .save(tenant.tenant_id(), head, ExpectedVersion::NoRecord)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::created(&saved))
}

pub async fn get_head(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.read")?;
    let head_id: BudgetHeadId = parse_id(&id, "budget head")?;

    let head = load_head(&services, tenant.tenant_id(), head_id).await?;
    Ok(dto::ok(&head))
}

pub async fn update_head(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::BudgetHeadRequest>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;
    let head_id: BudgetHeadId = parse_id(&id, "budget head")?;

    let current = load_head(&services, tenant.tenant_id(), head_id).await?;
    let expected = expected_version(body.row_version, current.row_version);
    let head = head_from_request(head_id, tenant.tenant_id(), body);

    if head.head_type != current.record.head_type {
        if !child_heads(&services, tenant.tenant_id(), head_id).await?.is_empty() {
            return Err(errors::domain_error_to_response(DomainError::invariant(
                "cannot change head_type of a budget head with child heads",
            )));
        }
        // Allocations carry the head_type they were booked under.
        if has_allocations(&services, tenant.tenant_id(), head_id).await? {
            return Err(errors::domain_error_to_response(DomainError::invariant(
                "cannot change head_type of a budget head with allocations",
            )));
        }
    }
    check_head(&services, tenant.tenant_id(), &head).await?;

    let saved = services
        .save(tenant.tenant_id(), head, expected)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&saved))
}

/// Only heads nothing refers to can be deleted.
pub async fn delete_head(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;
    let head_id: BudgetHeadId = parse_id(&id, "budget head")?;
    let tenant_id = tenant.tenant_id();

    load_head(&services, tenant_id, head_id).await?;

    if !child_heads(&services, tenant_id, head_id).await?.is_empty() {
        return Err(errors::domain_error_to_response(DomainError::invariant(
            "budget head has child heads",
        )));
    }
    if has_allocations(&services, tenant_id, head_id).await? {
        return Err(errors::domain_error_to_response(DomainError::invariant(
            "budget head has allocations",
        )));
    }

    services
        .remove::<BudgetHead>(tenant_id, head_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Heads in tree order with own and subtree totals.
pub async fn head_rollup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::FiscalYearParams>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.read")?;
    let tenant_id = tenant.tenant_id();

    let heads = services
        .records::<BudgetHead>(tenant_id, &Query::new())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    let allocations = allocations_for_year(&services, tenant_id, params.fiscal_year.as_deref()).await?;

    Ok(dto::items(&rollup_heads(&heads, &allocations)))
}

fn head_from_request(id: BudgetHeadId, tenant_id: TenantId, body: dto::BudgetHeadRequest) -> BudgetHead {
    BudgetHead {
        id,
        tenant_id,
        name: body.name.trim().to_string(),
        code: body.code.trim().to_string(),
        head_type: body.head_type,
        parent_id: body.parent_id,
        display_order: body.display_order,
        is_active: body.is_active,
    }
}

async fn check_head(services: &AppServices, tenant_id: TenantId, head: &BudgetHead) -> Result<(), Response> {
    head.validate().map_err(errors::domain_error_to_response)?;
    if head.parent_id.is_some() {
        let existing = services
            .records::<BudgetHead>(tenant_id, &Query::new())
            .await
            .map_err(errors::dispatch_error_to_response)?;
        head.validate_parent(&existing).map_err(errors::domain_error_to_response)?;
    }
    Ok(())
}

async fn load_head(
    services: &AppServices,
    tenant_id: TenantId,
    head_id: BudgetHeadId,
) -> Result<Versioned<BudgetHead>, Response> {
    services
        .find::<BudgetHead>(tenant_id, head_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?
        .ok_or_else(|| errors::not_found("budget head"))
}

async fn child_heads(
    services: &AppServices,
    tenant_id: TenantId,
    head_id: BudgetHeadId,
) -> Result<Vec<BudgetHead>, Response> {
    services
        .records::<BudgetHead>(tenant_id, &Query::new().eq("parent_id", head_id.to_string()))
        .await
        .map_err(errors::dispatch_error_to_response)
}

async fn has_allocations(
    services: &AppServices,
    tenant_id: TenantId,
    head_id: BudgetHeadId,
) -> Result<bool, Response> {
    let booked = services
        .records::<BudgetAllocation>(tenant_id, &Query::new().eq("budget_head_id", head_id.to_string()).limit(1))
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(!booked.is_empty())
}

// -------------------------
// Allocations
// -------------------------

pub async fn list_allocations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::ListParams>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.read")?;
    let allocations = services
        .list::<BudgetAllocation>(tenant.tenant_id(), &params.query())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&allocations))
}

pub async fn create_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateAllocationRequest>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;
    let tenant_id = tenant.tenant_id();

    let head = services
        .find::<BudgetHead>(tenant_id, body.budget_head_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?
        .ok_or_else(|| {
            errors::domain_error_to_response(DomainError::validation("budget head does not exist"))
        })?
        .into_inner();
    if !head.is_active {
        return Err(errors::domain_error_to_response(DomainError::invariant(
            "budget head is inactive",
        )));
    }

    let allocation_id = BudgetAllocationId::generate();
    let command = BudgetAllocationCommand::CreateAllocation(CreateAllocation {
        tenant_id,
        allocation_id,
        fiscal_year: body.fiscal_year,
        department: body.department,
        budget_head_id: head.id,
        head_type: head.head_type,
        allocated_amount: body.allocated_amount,
        notes: body.notes,
        occurred_at: Utc::now(),
    });

    let record = dispatch_allocation(&services, tenant_id, allocation_id, command).await?;
    Ok(dto::created(&record))
}

pub async fn get_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.read")?;
    let allocation_id: BudgetAllocationId = parse_id(&id, "allocation")?;

    let allocation = services
        .get::<BudgetAllocation>(tenant.tenant_id(), allocation_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&allocation))
}

pub async fn update_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateAllocationRequest>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;
    let allocation_id: BudgetAllocationId = parse_id(&id, "allocation")?;

    let command = BudgetAllocationCommand::UpdateAllocation(UpdateAllocation {
        tenant_id: tenant.tenant_id(),
        allocation_id,
        department: body.department,
        allocated_amount: body.allocated_amount,
        notes: body.notes,
        occurred_at: Utc::now(),
    });
    let record = dispatch_allocation(&services, tenant.tenant_id(), allocation_id, command).await?;
    Ok(dto::ok(&record))
}

/// Draft and rejected allocations only.
pub async fn delete_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;
    let allocation_id: BudgetAllocationId = parse_id(&id, "allocation")?;
    let tenant_id = tenant.tenant_id();

    let current = services
        .get::<BudgetAllocation>(tenant_id, allocation_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    if !matches!(current.record.status(), AllocationStatus::Draft | AllocationStatus::Rejected) {
        return Err(errors::domain_error_to_response(DomainError::invariant(format!(
            "cannot delete an allocation in status {:?}",
            current.record.status()
        ))));
    }

    services
        .remove::<BudgetAllocation>(tenant_id, allocation_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn submit_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;
    let allocation_id: BudgetAllocationId = parse_id(&id, "allocation")?;

    let command = BudgetAllocationCommand::SubmitAllocation(SubmitAllocation {
        tenant_id: tenant.tenant_id(),
        allocation_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_allocation(&services, tenant.tenant_id(), allocation_id, command).await?;
    Ok(dto::ok(&record))
}

/// Body is optional; without `approved_amount` the allocated amount is approved.
pub async fn approve_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ApproveAllocationRequest>>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.approve")?;
    let allocation_id: BudgetAllocationId = parse_id(&id, "allocation")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let command = BudgetAllocationCommand::ApproveAllocation(ApproveAllocation {
        tenant_id: tenant.tenant_id(),
        allocation_id,
        approved_amount: body.approved_amount,
        occurred_at: Utc::now(),
    });
    let record = dispatch_allocation(&services, tenant.tenant_id(), allocation_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn reject_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectRequestBody>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.approve")?;
    let allocation_id: BudgetAllocationId = parse_id(&id, "allocation")?;

    let command = BudgetAllocationCommand::RejectAllocation(RejectAllocation {
        tenant_id: tenant.tenant_id(),
        allocation_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let record = dispatch_allocation(&services, tenant.tenant_id(), allocation_id, command).await?;
    Ok(dto::ok(&record))
}

/// Rejected back to draft.
pub async fn revise_allocation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.write")?;
    let allocation_id: BudgetAllocationId = parse_id(&id, "allocation")?;

    let command = BudgetAllocationCommand::ReviseAllocation(ReviseAllocation {
        tenant_id: tenant.tenant_id(),
        allocation_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_allocation(&services, tenant.tenant_id(), allocation_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn budget_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::FiscalYearParams>,
) -> ApiResult {
    require(&tenant, &principal, "budgets.read")?;
    let fiscal_year = params.fiscal_year.as_deref();

    let allocations = allocations_for_year(&services, tenant.tenant_id(), fiscal_year).await?;
    Ok(dto::ok(&summarize(&allocations, fiscal_year)))
}

async fn allocations_for_year(
    services: &AppServices,
    tenant_id: TenantId,
    fiscal_year: Option<&str>,
) -> Result<Vec<BudgetAllocation>, Response> {
    let mut query = Query::new();
    if let Some(year) = fiscal_year {
        query = query.eq("fiscal_year", year);
    }
    services
        .records::<BudgetAllocation>(tenant_id, &query)
        .await
        .map_err(errors::dispatch_error_to_response)
}

async fn dispatch_allocation(
    services: &AppServices,
    tenant_id: TenantId,
    allocation_id: BudgetAllocationId,
    command: BudgetAllocationCommand,
) -> Result<Versioned<BudgetAllocation>, Response> {
    services
        .dispatch::<BudgetAllocation>(tenant_id, allocation_id.record_id(), command, |_t, record_id| {
            BudgetAllocation::empty(BudgetAllocationId::new(record_id))
        })
        .await
        .map(|dispatched| dispatched.record)
        .map_err(errors::dispatch_error_to_response)
}
