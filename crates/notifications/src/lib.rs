//! Notification settings domain: email templates and their rendering,
//! outgoing-mail provider settings and organization settings.
//!
//! Pure domain logic only. Delivery and connection probing live in
//! `procura-infra::mailer`.

pub mod organization;
pub mod provider;
pub mod template;

pub use organization::OrganizationSettings;
pub use provider::{EmailProviderSettings, EmailProviderView, ProviderUpdate};
pub use template::{
    EmailTemplate, EmailTemplateId, RenderedEmail, TemplateVariables, default_templates,
    render_html, render_text, template_key_for_event, variables_from_json,
};
