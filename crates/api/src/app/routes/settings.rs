use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use procura_core::{DomainError, ExpectedVersion, RecordId, TenantId};
use procura_infra::{MailError, Mailer, OutgoingEmail, Query, Versioned, test_connection};
use procura_notifications::{
    EmailProviderSettings, EmailTemplate, EmailTemplateId, OrganizationSettings, ProviderUpdate, RenderedEmail,
    default_templates,
};

use crate::app::dto;
use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/email/templates", get(list_templates).post(create_template))
        .route("/email/templates/seed", post(seed_templates))
        .route(
            "/email/templates/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/email/templates/:id/render", post(render_template))
        .route("/email/provider", get(get_provider).put(update_provider))
        .route("/email/test-connection", post(test_provider_connection))
        .route("/email/test-send", post(send_test_email))
        .route("/organization", get(get_organization).put(update_organization))
}

// -------------------------
// Email templates
// -------------------------

pub async fn list_templates(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&tenant, &principal, "settings.read")?;
    let templates = services
        .list::<EmailTemplate>(tenant.tenant_id(), &Query::new().order_by("template_key", false))
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::items(&templates))
}

/// Duplicate keys are rejected by the store's unique constraint.
pub async fn create_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::EmailTemplateRequest>,
) -> ApiResult {
    require(&tenant, &principal, "settings.email.write")?;

    let template = template_from_request(EmailTemplateId::generate(), tenant.tenant_id(), body);
    template.validate().map_err(errors::domain_error_to_response)?;

    let saved = services
        .save(tenant.tenant_id(), template, ExpectedVersion::NoRecord)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::created(&saved))
}

/// Insert the built-in templates whose keys the tenant does not have yet.
pub async fn seed_templates(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&tenant, &principal, "settings.email.write")?;
    let tenant_id = tenant.tenant_id();

    let existing: BTreeSet<String> = services
        .records::<EmailTemplate>(tenant_id, &Query::new())
        .await
        .map_err(errors::dispatch_error_to_response)?
        .into_iter()
        .map(|t| t.template_key)
        .collect();

    let mut created = Vec::new();
    for template in default_templates(tenant_id) {
        if existing.contains(&template.template_key) {
            continue;
        }
        created.push(
            services
                .save(tenant_id, template, ExpectedVersion::NoRecord)
                .await
                .map_err(errors::dispatch_error_to_response)?,
        );
    }

    Ok(dto::created(&serde_json::json!({ "items": created })))
}

pub async fn get_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "settings.read")?;
    let template_id: EmailTemplateId = parse_id(&id, "template")?;

    let template = load_template(&services, tenant.tenant_id(), template_id).await?;
    Ok(dto::ok(&template))
}

pub async fn update_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::EmailTemplateRequest>,
) -> ApiResult {
    require(&tenant, &principal, "settings.email.write")?;
    let template_id: EmailTemplateId = parse_id(&id, "template")?;

    let current = load_template(&services, tenant.tenant_id(), template_id).await?;
    let template = template_from_request(template_id, tenant.tenant_id(), body);
    template.validate().map_err(errors::domain_error_to_response)?;

    let saved = services
        .save(tenant.tenant_id(), template, current.expected())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&saved))
}

pub async fn delete_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&tenant, &principal, "settings.email.write")?;
    let template_id: EmailTemplateId = parse_id(&id, "template")?;

    load_template(&services, tenant.tenant_id(), template_id).await?;
    services
        .remove::<EmailTemplate>(tenant.tenant_id(), template_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Preview with caller-supplied variables; nothing is sent.
pub async fn render_template(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::RenderRequest>>,
) -> ApiResult {
    require(&tenant, &principal, "settings.read")?;
    let template_id: EmailTemplateId = parse_id(&id, "template")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let template = load_template(&services, tenant.tenant_id(), template_id).await?;
    Ok(dto::ok(&template.record.render(&body.variables)))
}

fn template_from_request(id: EmailTemplateId, tenant_id: TenantId, body: dto::EmailTemplateRequest) -> EmailTemplate {
    let mut template = EmailTemplate {
        id,
        tenant_id,
        template_key: body.template_key.trim().to_string(),
        name: body.name.trim().to_string(),
        subject: body.subject,
        body_html: body.body_html,
        body_text: body.body_text,
        variables: Vec::new(),
        is_active: body.is_active,
    };
    template.variables = body.variables.unwrap_or_else(|| template.placeholders());
    template
}

async fn load_template(
    services: &AppServices,
    tenant_id: TenantId,
    template_id: EmailTemplateId,
) -> Result<Versioned<EmailTemplate>, Response> {
    services
        .find::<EmailTemplate>(tenant_id, template_id.record_id())
        .await
        .map_err(errors::dispatch_error_to_response)?
        .ok_or_else(|| errors::not_found("template"))
}

// -------------------------
// Email provider
// -------------------------

/// The password is never returned, only whether one is stored.
pub async fn get_provider(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&tenant, &principal, "settings.read")?;

    let provider = load_provider(&services, tenant.tenant_id())
        .await?
        .ok_or_else(|| errors::not_found("email provider"))?;
    Ok(dto::ok(&provider.view()))
}

pub async fn update_provider(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ProviderUpdate>,
) -> ApiResult {
    require(&tenant, &principal, "settings.email.write")?;
    let tenant_id = tenant.tenant_id();

    let current = load_provider(&services, tenant_id).await?;
    let settings = EmailProviderSettings::apply_update(tenant_id, current.as_ref(), body)
        .map_err(errors::domain_error_to_response)?;

    let saved = services
        .save(tenant_id, settings, ExpectedVersion::Any)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&saved.record.view()))
}

/// TCP reachability of the relay, using the stored host/port unless overridden.
pub async fn test_provider_connection(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::TestConnectionRequest>>,
) -> ApiResult {
    require(&tenant, &principal, "settings.email.write")?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let stored = load_provider(&services, tenant.tenant_id()).await?;
    let host = body
        .host
        .filter(|h| !h.trim().is_empty())
        .or_else(|| stored.as_ref().map(|p| p.host.clone()))
        .ok_or_else(|| errors::domain_error_to_response(DomainError::validation("host is required")))?;
    let port = body.port.or_else(|| stored.as_ref().map(|p| p.port)).unwrap_or(587);

    let result = test_connection(&host, port, services.smtp_timeout()).await;
    tracing::info!(tenant_id = %tenant.tenant_id(), host = %host, port, ok = result.ok, "smtp connection test");
    Ok(dto::ok(&result))
}

/// Render a template (or a fixed test message) and deliver it.
pub async fn send_test_email(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::TestSendRequest>,
) -> ApiResult {
    require(&tenant, &principal, "settings.email.write")?;
    let tenant_id = tenant.tenant_id();

    let provider = load_provider(&services, tenant_id).await?.ok_or_else(|| {
        errors::domain_error_to_response(DomainError::invariant("email provider is not configured"))
    })?;
    let organization = load_organization(&services, tenant_id).await?;

    let rendered = match body.template_key.as_deref() {
        Some(key) => {
            let template = services
                .records::<EmailTemplate>(tenant_id, &Query::new().eq("template_key", key).limit(1))
                .await
                .map_err(errors::dispatch_error_to_response)?
                .into_iter()
                .next()
                .ok_or_else(|| errors::not_found("template"))?;
            let mut vars = body.variables;
            vars.entry("organization_name".to_string())
                .or_insert_with(|| organization.name.clone());
            template.render(&vars)
        }
        None => RenderedEmail {
            subject: format!("{} test email", organization.name),
            body_html: format!(
                "<p>This is a test email from {}. Your email settings work.</p>",
                organization.name
            ),
            body_text: Some(format!(
                "This is a test email from {}. Your email settings work.",
                organization.name
            )),
            missing_variables: Vec::new(),
        },
    };

    let missing_variables = rendered.missing_variables.clone();
    let email = OutgoingEmail::from_rendered(&provider, vec![body.to.clone()], rendered);
    services
        .mailer()
        .send(&provider, email)
        .await
        .map_err(mail_error_to_response)?;

    tracing::info!(tenant_id = %tenant_id, to = %body.to, "test email sent");
    Ok(dto::ok(&serde_json::json!({
        "sent": true,
        "to": body.to,
        "missing_variables": missing_variables,
    })))
}

fn mail_error_to_response(err: MailError) -> Response {
    match err {
        MailError::ProviderInactive => {
            errors::json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", err.to_string())
        }
        MailError::NoRecipients => errors::json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string()),
        MailError::Delivery(_) => {
            tracing::warn!(error = %err, "test email delivery failed");
            errors::json_error(StatusCode::BAD_GATEWAY, "delivery_failed", err.to_string())
        }
    }
}

async fn load_provider(
    services: &AppServices,
    tenant_id: TenantId,
) -> Result<Option<EmailProviderSettings>, Response> {
    Ok(services
        .find::<EmailProviderSettings>(tenant_id, RecordId::singleton(tenant_id))
        .await
        .map_err(errors::dispatch_error_to_response)?
        .map(Versioned::into_inner))
}

// -------------------------
// Organization
// -------------------------

pub async fn get_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    require(&tenant, &principal, "settings.read")?;
    let organization = load_organization(&services, tenant.tenant_id()).await?;
    Ok(dto::ok(&organization))
}

pub async fn update_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OrganizationRequest>,
) -> ApiResult {
    require(&tenant, &principal, "settings.organization.write")?;

    let organization = OrganizationSettings {
        tenant_id: tenant.tenant_id(),
        name: body.name.trim().to_string(),
        currency: body.currency.trim().to_uppercase(),
        fiscal_year_start_month: body.fiscal_year_start_month,
        address: body.address,
        contact_email: body.contact_email.filter(|e| !e.trim().is_empty()),
    };
    organization.validate().map_err(errors::domain_error_to_response)?;

    let saved = services
        .save(tenant.tenant_id(), organization, ExpectedVersion::Any)
        .await
        .map_err(errors::dispatch_error_to_response)?;
    Ok(dto::ok(&saved))
}

/// Stored settings, or the defaults when the tenant has none yet.
async fn load_organization(services: &AppServices, tenant_id: TenantId) -> Result<OrganizationSettings, Response> {
    Ok(services
        .find::<OrganizationSettings>(tenant_id, RecordId::singleton(tenant_id))
        .await
        .map_err(errors::dispatch_error_to_response)?
        .map(Versioned::into_inner)
        .unwrap_or_else(|| OrganizationSettings::defaults(tenant_id)))
}
