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
use procura_invoicing::{
    AddInvoiceItem, ApproveInvoice, CancelInvoice, CreateInvoice, Invoice, InvoiceCommand, InvoiceId,
    InvoiceStatus, RegisterPayment, RejectInvoice, RemoveInvoiceItem, SubmitInvoice, UpdateInvoice,
    invoice_stats,
};
use procura_purchasing::{PurchaseOrder, PurchaseOrderStatus};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/stats", get(stats))
        .route("/:id", get(get_invoice).put(update_invoice).delete(delete_invoice))
        .route("/:id/items", post(add_invoice_item))
        .route("/:id/items/:line_no", delete(remove_invoice_item))
        .route("/:id/submit", post(submit_invoice))
        .route("/:id/approve", post(approve_invoice))
        .route("/:id/reject", post(reject_invoice))
        .route("/:id/payments", post(register_payment))
        .route("/:id/cancel", post(cancel_invoice))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.write")?;
    let tenant_id = tenant.tenant_id();

    if let Some(order_id) = body.purchase_order_id {
        let order = services
            .find::<PurchaseOrder>(tenant_id, order_id.record_id())
            .await
            .map_err(errors::dispatch_error_to_response)?
            .ok_or_else(|| {
                errors::domain_error_to_response(DomainError::validation("purchase order does not exist"))
            })?;
        if order.record.status() == PurchaseOrderStatus::Cancelled {
            return Err(errors::domain_error_to_response(DomainError::invariant(
                "cannot invoice a cancelled purchase order",
            )));
        }
    }

    let invoice_id = InvoiceId::generate();
    let command = InvoiceCommand::CreateInvoice(CreateInvoice {
        tenant_id,
        invoice_id,
        invoice_number: body.invoice_number,
        vendor_id: body.vendor_id,
        vendor_name: body.vendor_name,
        purchase_order_id: body.purchase_order_id,
        invoice_date: body.invoice_date,
        due_date: body.due_date,
        notes: body.notes,
        occurred_at: Utc::now(),
    });
    let mut record = dispatch_invoice(&services, tenant_id, invoice_id, command).await?;

    for item in body.items {
        let command = InvoiceCommand::AddItem(AddInvoiceItem {
            tenant_id,
            invoice_id,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate: item.tax_rate,
            discount_rate: item.discount_rate,
            occurred_at: Utc::now(),
        });
        record = dispatch_invoice(&services, tenant_id, invoice_id, command).await?;
    }

    Ok(dto::created(&record))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::ListParams>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.read")?;
    let invoices = services
        .list::<Invoice>(tenant.tenant_id(), &params.query())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&invoices))
}

/// Totals by status plus overdue, as of `?as_of=` (today by default).
pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    QueryParams(params): QueryParams<dto::AsOfParams>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.read")?;
    let as_of = params.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let invoices = services
        .records::<Invoice>(tenant.tenant_id(), &Query::new())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&invoice_stats(&invoices, as_of)))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.read")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let invoice = services
        .get::<Invoice>(tenant.tenant_id(), invoice_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&invoice))
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateInvoiceRequest>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.write")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let command = InvoiceCommand::UpdateInvoice(UpdateInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        vendor_name: body.vendor_name,
        invoice_date: body.invoice_date,
        due_date: body.due_date,
        notes: body.notes,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.write")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;
    let tenant_id = tenant.tenant_id();

    let current = services
        .get::<Invoice>(tenant_id, invoice_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    if current.record.status() != InvoiceStatus::Draft {
        return Err(errors::domain_error_to_response(DomainError::invariant(
            "only draft invoices can be deleted",
        )));
    }

    services
        .remove::<Invoice>(tenant_id, invoice_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn add_invoice_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::InvoiceItemRequest>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.write")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let command = InvoiceCommand::AddItem(AddInvoiceItem {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        description: body.description,
        quantity: body.quantity,
        unit_price: body.unit_price,
        tax_rate: body.tax_rate,
        discount_rate: body.discount_rate,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::created(&record))
}

pub async fn remove_invoice_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, line_no)): Path<(String, u32)>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.write")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let command = InvoiceCommand::RemoveItem(RemoveInvoiceItem {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        line_no,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn submit_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.write")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let command = InvoiceCommand::Submit(SubmitInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn approve_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.approve")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let command = InvoiceCommand::Approve(ApproveInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn reject_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectRequestBody>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.approve")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let command = InvoiceCommand::Reject(RejectInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::ok(&record))
}

/// Partial payments accumulate; the invoice is paid once they cover the total.
pub async fn register_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PaymentRequest>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.pay")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;

    let command = InvoiceCommand::RegisterPayment(RegisterPayment {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        amount: body.amount,
        reference: body.reference,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::ok(&record))
}

pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    require(&tenant, &principal, "invoices.write")?;
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let command = InvoiceCommand::Cancel(CancelInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        reason: body.reason,
        occurred_at: Utc::now(),
    });
    let record = dispatch_invoice(&services, tenant.tenant_id(), invoice_id, command).await?;
    Ok(dto::ok(&record))
}

async fn dispatch_invoice(
    services: &AppServices,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    command: InvoiceCommand,
) -> Result<Versioned<Invoice>, Response> {
    services
        .dispatch::<Invoice>(tenant_id, invoice_id.record_id(), command, |_t, record_id| {
            Invoice::empty(InvoiceId::new(record_id))
        })
        .await
        .map(|dispatched| dispatched.record)
        .map_err(errors::dispatch_error_to_response)
}
