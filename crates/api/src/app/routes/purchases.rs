use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query as QueryParams},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Serialize;

use procura_core::{DomainError, ExpectedVersion, RecordId, TenantId};
use procura_infra::Versioned;
use procura_purchasing::{
    AddLine, Approve, CancelPurchaseOrder, ClosePurchaseOrder, CreatePurchaseOrder, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderId, ReceiveGoods, RemoveLine, StandardPoSettings,
};
use procura_requests::{ProcurementRequest, RequestStatus};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .nest("/orders", orders_router())
        .route("/settings", get(get_settings).put(update_settings))
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/lines", post(add_purchase_order_line))
        .route("/:id/lines/:line_no", delete(remove_purchase_order_line))
        .route("/:id/approve", post(approve_purchase_order))
        .route("/:id/receive", post(receive_purchase_order_goods))
        .route("/:id/close", post(close_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}

/// Numbers the order from the tenant's PO settings, then adds the lines.
pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.create")?;
    let tenant_id = tenant.tenant_id();

    if let Some(request_id) = body.request_id {
        let request = services
            .find::<ProcurementRequest>(tenant_id, request_id.record_id())
            .await
            .map_err(errors::dispatch_error_to_response)?
            .ok_or_else(|| errors::domain_error_to_response(DomainError::validation("request does not exist")))?;
        if request.record.status() != RequestStatus::Approved {
            return Err(errors::domain_error_to_response(DomainError::invariant(
                "purchase orders can only be raised against approved requests",
            )));
        }
    }

    let now = Utc::now();
    let po_number = services
        .next_po_number(tenant_id, now.year())
        .await
        .map_err(errors::dispatch_error_to_response)?;

    let order_id = PurchaseOrderId::generate();
    let command = PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
        tenant_id,
        order_id,
        po_number,
        vendor_id: body.vendor_id,
        vendor_name: body.vendor_name,
        request_id: body.request_id,
        expected_delivery: body.expected_delivery,
        notes: body.notes,
        occurred_at: now,
    });
    let mut record = dispatch_order(&services, tenant_id, order_id, command).await?;

    for line in body.lines {
        let command = PurchaseOrderCommand::AddLine(AddLine {
            tenant_id,
            order_id,
            description: line.description,
            quantity: line.quantity,
            unit_price: line.unit_price,
            tax_rate: line.tax_rate,
            occurred_at: Utc::now(),
        });
        record = dispatch_order(&services, tenant_id, order_id, command).await?;
    }

    Ok(dto::created(&record))
}

pub async fn list_purchase_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::ListParams>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.read")?;
    let orders = services
        .list::<PurchaseOrder>(tenant.tenant_id(), &params.query())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&orders))
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.read")?;
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;

    let order = services
        .get::<PurchaseOrder>(tenant.tenant_id(), order_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&order))
}

pub async fn add_purchase_order_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::OrderLineRequest>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.create")?;
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;

    let command = PurchaseOrderCommand::AddLine(AddLine {
        tenant_id: tenant.tenant_id(),
        order_id,
        description: body.description,
        quantity: body.quantity,
        unit_price: body.unit_price,
        tax_rate: body.tax_rate,
        occurred_at: Utc::now(),
    });
    let record = dispatch_order(&services, tenant.tenant_id(), order_id, command).await?;
    Ok(dto::created(&record))
}

pub async fn remove_purchase_order_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_no)): Path<(String, u32)>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.create")?;
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;

    let command = PurchaseOrderCommand::RemoveLine(RemoveLine {
        tenant_id: tenant.tenant_id(),
        order_id,
        line_no,
        occurred_at: Utc::now(),
    });
    let record = dispatch_order(&services, tenant.tenant_id(), order_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn approve_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.approve")?;
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;

    let command = PurchaseOrderCommand::Approve(Approve {
        tenant_id: tenant.tenant_id(),
        order_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_order(&services, tenant.tenant_id(), order_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn receive_purchase_order_goods(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.receive")?;
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;

    let command = PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
        tenant_id: tenant.tenant_id(),
        order_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_order(&services, tenant.tenant_id(), order_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn close_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.approve")?;
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;

    let command = PurchaseOrderCommand::Close(ClosePurchaseOrder {
        tenant_id: tenant.tenant_id(),
        order_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_order(&services, tenant.tenant_id(), order_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.approve")?;
    let order_id: PurchaseOrderId = parse_id(&id, "purchase order")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let command = PurchaseOrderCommand::Cancel(CancelPurchaseOrder {
        tenant_id: tenant.tenant_id(),
        order_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let record = dispatch_order(&services, tenant.tenant_id(), order_id, command).await?;
    Ok(dto::ok(&record))
}

async fn dispatch_order(
    services: &AppServices,
    tenant_id: TenantId,
    order_id: PurchaseOrderId,
    command: PurchaseOrderCommand,
) -> Result<Versioned<PurchaseOrder>, Response> {
    services
        .dispatch::<PurchaseOrder>(tenant_id, order_id.record_id(), command, |_t, record_id| {
            PurchaseOrder::empty(PurchaseOrderId::new(record_id))
        })
        .await
        .map(|dispatched| dispatched.record)
        .map_err(errors::dispatch_error_to_response)
}

// -------------------------
// Numbering settings
// -------------------------

#[derive(Debug, Serialize)]
struct PoSettingsView {
    #[serde(flatten)]
    settings: StandardPoSettings,
    /// The number the next order would get this year.
    preview: String,
}

impl PoSettingsView {
    fn new(settings: StandardPoSettings) -> Self {
        let preview = settings.format_po_number(Utc::now().year());
        Self { settings, preview }
    }
}

/// Stored settings, or the defaults when the tenant has none yet.
pub async fn get_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.read")?;
    let tenant_id = tenant.tenant_id();

    let settings = services
        .find::<StandardPoSettings>(tenant_id, RecordId::singleton(tenant_id))
        .await
        .map_err(errors::dispatch_error_to_response)?
        .map(Versioned::into_inner)
        .unwrap_or_else(|| StandardPoSettings::defaults(tenant_id));
    Ok(dto::ok(&PoSettingsView::new(settings)))
}

pub async fn update_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PoSettingsRequest>,
) -> ApiResult {
    require(&tenant, &principal, "purchases.settings")?;

    let settings = StandardPoSettings {
        tenant_id: tenant.tenant_id(),
        prefix: body.prefix.trim().to_string(),
        separator: body.separator,
        include_year: body.include_year,
        number_padding: body.number_padding,
        next_number: body.next_number,
    };
    settings.validate().map_err(errors::domain_error_to_response)?;

    let saved = services
        .save(tenant.tenant_id(), settings, ExpectedVersion::Any)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&PoSettingsView::new(saved.into_inner())))
}
