use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query as QueryParams},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;

use procura_core::{DomainError, TenantId};
use procura_infra::{Query, Versioned};
use procura_requests::{
    AddItem, ApproveRequest, CancelRequest, CompleteRequest, CreateRequest, ProcurementRequest,
    RejectRequest, RemoveItem, RequestCommand, RequestId, RequestStatus, StartReview, SubmitRequest,
    UpdateRequest, request_stats,
};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/stats", get(stats))
        .route("/:id", get(get_request).put(update_request).delete(delete_request))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:line_no", delete(remove_item))
        .route("/:id/submit", post(submit_request))
        .route("/:id/review", post(start_review))
        .route("/:id/approve", post(approve_request))
        .route("/:id/reject", post(reject_request))
        .route("/:id/complete", post(complete_request))
        .route("/:id/cancel", post(cancel_request))
}

pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::ListParams>,
) -> ApiResult {
    require(&tenant, &principal, "requests.read")?;
    let requests = services
        .list::<ProcurementRequest>(tenant.tenant_id(), &params.query())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&requests))
}

/// Create a draft request, then add any inline items.
pub async fn create_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProcurementRequest>,
) -> ApiResult {
    require(&tenant, &principal, "requests.create")?;
    let tenant_id = tenant.tenant_id();
    let request_id = RequestId::generate();

    let now = Utc::now();
    let request_number = body
        .request_number
        .unwrap_or_else(|| format!("PR-{}", now.format("%Y%m%d%H%M%S%3f")));

    let command = RequestCommand::CreateRequest(CreateRequest {
        tenant_id,
        request_id,
        request_number,
        title: body.title,
        description: body.description,
        department: body.department,
        requested_by: principal.user_id(),
        priority: body.priority,
        required_by: body.required_by,
        occurred_at: now,
    });
    let mut record = dispatch_request(&services, tenant_id, request_id, command).await?;

    for item in body.items {
        let command = RequestCommand::AddItem(AddItem {
            tenant_id,
            request_id,
            description: item.description,
            quantity: item.quantity,
            unit: item.unit,
            estimated_unit_price: item.estimated_unit_price,
            occurred_at: Utc::now(),
        });
        record = dispatch_request(&services, tenant_id, request_id, command).await?;
    }

    Ok(dto::created(&record))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&tenant, &principal, "requests.read")?;
    let requests = services
        .records::<ProcurementRequest>(tenant.tenant_id(), &Query::new())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&request_stats(&requests)))
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "requests.read")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let request = services
        .get::<ProcurementRequest>(tenant.tenant_id(), request_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&request))
}

pub async fn update_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProcurementRequest>,
) -> ApiResult {
    require(&tenant, &principal, "requests.update")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::UpdateRequest(UpdateRequest {
        tenant_id: tenant.tenant_id(),
        request_id,
        title: body.title,
        description: body.description,
        department: body.department,
        priority: body.priority,
        required_by: body.required_by,
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

/// Drafts only; anything further along is canceled instead.
pub async fn delete_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "requests.update")?;
    let request_id: RequestId = parse_id(&id, "request")?;
    let tenant_id = tenant.tenant_id();

    let current = services
        .get::<ProcurementRequest>(tenant_id, request_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    if current.record.status() != RequestStatus::Draft {
        return Err(errors::domain_error_to_response(DomainError::invariant(
            "only draft requests can be deleted",
        )));
    }

    services
        .remove::<ProcurementRequest>(tenant_id, request_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RequestItemRequest>,
) -> ApiResult {
    require(&tenant, &principal, "requests.update")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::AddItem(AddItem {
        tenant_id: tenant.tenant_id(),
        request_id,
        description: body.description,
        quantity: body.quantity,
        unit: body.unit,
        estimated_unit_price: body.estimated_unit_price,
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::created(&record))
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_no)): Path<(String, u32)>,
) -> ApiResult {
    require(&tenant, &principal, "requests.update")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::RemoveItem(RemoveItem {
        tenant_id: tenant.tenant_id(),
        request_id,
        line_no,
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn submit_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "requests.submit")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::SubmitRequest(SubmitRequest {
        tenant_id: tenant.tenant_id(),
        request_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn start_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "requests.review")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::StartReview(StartReview {
        tenant_id: tenant.tenant_id(),
        request_id,
        reviewer: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn approve_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "requests.approve")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::ApproveRequest(ApproveRequest {
        tenant_id: tenant.tenant_id(),
        request_id,
        approved_by: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn reject_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectRequestBody>,
) -> ApiResult {
    require(&tenant, &principal, "requests.approve")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::RejectRequest(RejectRequest {
        tenant_id: tenant.tenant_id(),
        request_id,
        rejected_by: principal.user_id(),
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn complete_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "requests.complete")?;
    let request_id: RequestId = parse_id(&id, "request")?;

    let command = RequestCommand::CompleteRequest(CompleteRequest {
        tenant_id: tenant.tenant_id(),
        request_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn cancel_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    require(&tenant, &principal, "requests.cancel")?;
    let request_id: RequestId = parse_id(&id, "request")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let command = RequestCommand::CancelRequest(CancelRequest {
        tenant_id: tenant.tenant_id(),
        request_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let record = dispatch_request(&services, tenant.tenant_id(), request_id, command).await?;
    Ok(dto::ok(&record))
}

async fn dispatch_request(
    services: &AppServices,
    tenant_id: TenantId,
    request_id: RequestId,
    command: RequestCommand,
) -> Result<Versioned<ProcurementRequest>, Response> {
    services
        .dispatch::<ProcurementRequest>(tenant_id, request_id.record_id(), command, |_t, record_id| {
            ProcurementRequest::empty(RequestId::new(record_id))
        })
        .await
        .map(|dispatched| dispatched.record)
        .map_err(errors::dispatch_error_to_response)
}
