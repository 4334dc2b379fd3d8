//! Request bodies, list parameters and JSON response helpers.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procura_budgeting::{BudgetHeadId, HeadType};
use procura_core::RecordId;
use procura_infra::Query;
use procura_purchasing::PurchaseOrderId;
use procura_requests::{Priority, RequestId};
use procura_rfp::{CriterionCategory, CriterionMark, EvaluationCriteria, RfpResponseId};

fn default_true() -> bool {
    true
}

// -------------------------
// Responses
// -------------------------

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (status, Json(body)).into_response()
}

pub fn ok<T: Serialize>(body: &T) -> Response {
    json_response(StatusCode::OK, body)
}

pub fn created<T: Serialize>(body: &T) -> Response {
    json_response(StatusCode::CREATED, body)
}

pub fn items<T: Serialize>(items: &[T]) -> Response {
    ok(&serde_json::json!({ "items": items }))
}

// -------------------------
// Listing
// -------------------------

/// `?status=&limit=&offset=` shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub department: Option<String>,
    pub fiscal_year: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl ListParams {
    /// Newest first, with the equality filters that were supplied.
    pub fn query(&self) -> Query {
        let mut query = Query::new().order_by("created_at", true).offset(self.offset);
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        for (field, value) in [
            ("status", &self.status),
            ("department", &self.department),
            ("fiscal_year", &self.fiscal_year),
        ] {
            if let Some(value) = value {
                query = query.eq(field, value.clone());
            }
        }
        query
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FiscalYearParams {
    pub fiscal_year: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AsOfParams {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

// -------------------------
// Budgets
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BudgetHeadRequest {
    pub name: String,
    pub code: String,
    pub head_type: HeadType,
    #[serde(default)]
    pub parent_id: Option<BudgetHeadId>,
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Expected row version for updates; omitted means "as just read".
    #[serde(default)]
    pub row_version: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HeadListParams {
    pub head_type: Option<HeadType>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateAllocationRequest {
    pub fiscal_year: String,
    pub department: String,
    pub budget_head_id: BudgetHeadId,
    pub allocated_amount: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAllocationRequest {
    pub department: Option<String>,
    pub allocated_amount: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveAllocationRequest {
    pub approved_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequestBody {
    pub reason: String,
}

// -------------------------
// Requests
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RequestItemRequest {
    pub description: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    pub estimated_unit_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProcurementRequest {
    /// Generated when omitted.
    #[serde(default)]
    pub request_number: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub department: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub required_by: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<RequestItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProcurementRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub department: Option<String>,
    pub priority: Option<Priority>,
    pub required_by: Option<NaiveDate>,
}

// -------------------------
// Purchasing
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub tax_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    #[serde(default)]
    pub vendor_id: Option<RecordId>,
    pub vendor_name: String,
    /// Approved procurement request this order fulfils.
    #[serde(default)]
    pub request_id: Option<RequestId>,
    #[serde(default)]
    pub expected_delivery: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PoSettingsRequest {
    pub prefix: String,
    pub separator: String,
    pub include_year: bool,
    pub number_padding: u32,
    pub next_number: u64,
}

// -------------------------
// Invoices
// -------------------------

#[derive(Debug, Deserialize)]
pub struct InvoiceItemRequest {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default)]
    pub discount_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub invoice_number: String,
    #[serde(default)]
    pub vendor_id: Option<RecordId>,
    pub vendor_name: String,
    #[serde(default)]
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub vendor_name: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: f64,
    #[serde(default)]
    pub reference: Option<String>,
}

// -------------------------
// RFPs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRfpRequest {
    /// Generated when omitted.
    #[serde(default)]
    pub rfp_number: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub submission_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_budget: Option<f64>,
    pub evaluation_criteria: EvaluationCriteria,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRfpRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub submission_deadline: Option<DateTime<Utc>>,
    pub estimated_budget: Option<f64>,
    pub evaluation_criteria: Option<EvaluationCriteria>,
}

#[derive(Debug, Deserialize)]
pub struct CriterionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: CriterionCategory,
    pub max_score: f64,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct ResponseItemRequest {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponseRequest {
    pub vendor_id: RecordId,
    pub vendor_name: String,
    pub items: Vec<ResponseItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub technical_score: Option<f64>,
    #[serde(default)]
    pub commercial_score: Option<f64>,
    /// Per-criterion marks; when given without `technical_score` the
    /// technical score is derived from them.
    #[serde(default)]
    pub criterion_marks: Vec<CriterionMark>,
}

#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    pub response_id: RfpResponseId,
}

// -------------------------
// Settings
// -------------------------

#[derive(Debug, Deserialize)]
pub struct EmailTemplateRequest {
    pub template_key: String,
    pub name: String,
    pub subject: String,
    pub body_html: String,
    #[serde(default)]
    pub body_text: Option<String>,
    /// Defaults to the placeholders found in the template.
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestConnectionRequest {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct TestSendRequest {
    pub to: String,
    #[serde(default)]
    pub template_key: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct OrganizationRequest {
    pub name: String,
    pub currency: String,
    pub fiscal_year_start_month: u32,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}
