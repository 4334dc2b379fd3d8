//! Email templates (`email_templates`) and `{{ name }}` placeholder rendering.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, Entity, RecordId, TableBacked, TenantId};

procura_core::record_id!(EmailTemplateId);

/// Values substituted into a template, keyed by placeholder name.
pub type TemplateVariables = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").expect("placeholder pattern is valid")
});

static TEMPLATE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("template key pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: EmailTemplateId,
    pub tenant_id: TenantId,
    /// Unique per tenant (enforced by the record store).
    pub template_key: String,
    pub name: String,
    pub subject: String,
    pub body_html: String,
    #[serde(default)]
    pub body_text: Option<String>,
    /// Documented placeholder names, for the settings screen.
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub body_html: String,
    pub body_text: Option<String>,
    /// Placeholders that had no value and rendered empty, sorted and deduplicated.
    pub missing_variables: Vec<String>,
}

/// Replace `{{ name }}` placeholders; unknown names render as empty strings
/// and are appended to `missing`.
pub fn render_text(source: &str, vars: &TemplateVariables, missing: &mut Vec<String>) -> String {
    substitute(source, vars, missing, |value| value.to_string())
}

/// Like [`render_text`], with every substituted value HTML-escaped.
/// The template's own markup is left alone.
pub fn render_html(source: &str, vars: &TemplateVariables, missing: &mut Vec<String>) -> String {
    substitute(source, vars, missing, |value| html_escape::encode_safe(value).into_owned())
}

fn substitute(
    source: &str,
    vars: &TemplateVariables,
    missing: &mut Vec<String>,
    encode: impl Fn(&str) -> String,
) -> String {
    PLACEHOLDER
        .replace_all(source, |caps: &Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => encode(value),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Scalar top-level fields of a JSON object as template variables.
/// Strings are used verbatim; numbers and booleans via their JSON text.
pub fn variables_from_json(value: &serde_json::Value) -> TemplateVariables {
    let Some(object) = value.as_object() else {
        return TemplateVariables::new();
    };
    object
        .iter()
        .filter_map(|(key, v)| {
            let text = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect()
}

impl EmailTemplate {
    pub fn validate(&self) -> DomainResult<()> {
        if !TEMPLATE_KEY.is_match(&self.template_key) {
            return Err(DomainError::validation(
                "template_key must be lowercase snake_case",
            ));
        }
        DomainError::require_text("name", &self.name)?;
        DomainError::require_text("subject", &self.subject)?;
        DomainError::require_text("body_html", &self.body_html)?;
        Ok(())
    }

    /// Placeholder names used anywhere in the template, sorted and deduplicated.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = [Some(&self.subject), Some(&self.body_html), self.body_text.as_ref()]
            .into_iter()
            .flatten()
            .flat_map(|text| PLACEHOLDER.captures_iter(text).map(|c| c[1].to_string()).collect::<Vec<_>>())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn render(&self, vars: &TemplateVariables) -> RenderedEmail {
        let mut missing = Vec::new();
        let subject = render_text(&self.subject, vars, &mut missing);
        let body_html = render_html(&self.body_html, vars, &mut missing);
        let body_text = self.body_text.as_deref().map(|t| render_text(t, vars, &mut missing));
        missing.sort();
        missing.dedup();
        RenderedEmail {
            subject,
            body_html,
            body_text,
            missing_variables: missing,
        }
    }
}

impl Entity for EmailTemplate {
    type Id = EmailTemplateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TableBacked for EmailTemplate {
    const TABLE: &'static str = "email_templates";

    fn row_id(&self) -> RecordId {
        self.id.0
    }
}

/// Template key notified for a bus event type, if any.
pub fn template_key_for_event(event_type: &str) -> Option<&'static str> {
    match event_type {
        "requests.request.approved" => Some("request_approved"),
        "requests.request.rejected" => Some("request_rejected"),
        "purchasing.order.approved" => Some("po_approved"),
        "invoicing.invoice.approved" => Some("invoice_approved"),
        "rfp.rfp.awarded" => Some("rfp_awarded"),
        _ => None,
    }
}

/// Starter templates for a new tenant, one per notified event.
pub fn default_templates(tenant_id: TenantId) -> Vec<EmailTemplate> {
    let seed = |key: &str, name: &str, subject: &str, body: &str, variables: &[&str]| EmailTemplate {
        id: EmailTemplateId::generate(),
        tenant_id,
        template_key: key.to_string(),
        name: name.to_string(),
        subject: subject.to_string(),
        body_html: format!("<p>{body}</p>"),
        body_text: Some(body.to_string()),
        variables: variables.iter().map(|v| v.to_string()).collect(),
        is_active: true,
    };

    vec![
        seed(
            "request_approved",
            "Request approved",
            "Request {{ request_number }} approved",
            "Your procurement request {{ request_number }} ({{ title }}, est. {{ estimated_total }}) was approved.",
            &["request_number", "title", "estimated_total"],
        ),
        seed(
            "request_rejected",
            "Request rejected",
            "Request {{ request_number }} rejected",
            "Your procurement request {{ request_number }} ({{ title }}) was rejected: {{ reason }}",
            &["request_number", "title", "reason"],
        ),
        seed(
            "po_approved",
            "Purchase order approved",
            "Purchase order {{ po_number }} approved",
            "Purchase order {{ po_number }} for {{ vendor_name }} ({{ total_amount }}) was approved.",
            &["po_number", "vendor_name", "total_amount"],
        ),
        seed(
            "invoice_approved",
            "Invoice approved",
            "Invoice {{ invoice_number }} approved for payment",
            "Invoice {{ invoice_number }} from {{ vendor_name }} ({{ total_amount }}) is approved, due {{ due_date }}.",
            &["invoice_number", "vendor_name", "total_amount", "due_date"],
        ),
        seed(
            "rfp_awarded",
            "RFP awarded",
            "RFP awarded to {{ vendor_name }}",
            "The RFP was awarded to {{ vendor_name }} with a final score of {{ final_score }}.",
            &["vendor_name", "final_score"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn vars(pairs: &[(&str, &str)]) -> TemplateVariables {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn template(subject: &str, html: &str, text: Option<&str>) -> EmailTemplate {
        EmailTemplate {
            id: EmailTemplateId::generate(),
            tenant_id: TenantId::new(),
            template_key: "request_approved".to_string(),
            name: "Request approved".to_string(),
            subject: subject.to_string(),
            body_html: html.to_string(),
            body_text: text.map(str::to_string),
            variables: vec![],
            is_active: true,
        }
    }

    #[test]
    fn renders_whitespace_tolerant_placeholders() {
        let t = template(
            "PR {{request_number}} approved",
            "<b>{{ title }}</b> by {{   approver  }}",
            Some("{{ title }}"),
        );
        let rendered = t.render(&vars(&[("request_number", "PR-7"), ("title", "Laptops"), ("approver", "Dana")]));

        assert_eq!(rendered.subject, "PR PR-7 approved");
        assert_eq!(rendered.body_html, "<b>Laptops</b> by Dana");
        assert_eq!(rendered.body_text.as_deref(), Some("Laptops"));
        assert!(rendered.missing_variables.is_empty());
    }

    #[test]
    fn html_body_escapes_values_but_not_subject_or_text() {
        let t = template("New bid from {{ vendor_name }}", "<p>{{ vendor_name }}</p>", Some("{{ vendor_name }}"));
        let rendered = t.render(&vars(&[("vendor_name", "<script>alert(1)</script> & Co")]));

        assert!(rendered.body_html.starts_with("<p>&lt;script&gt;alert(1)"));
        assert!(rendered.body_html.ends_with(" &amp; Co</p>"));
        assert!(!rendered.body_html.contains("<script>"));
        assert_eq!(rendered.subject, "New bid from <script>alert(1)</script> & Co");
        assert_eq!(rendered.body_text.as_deref(), Some("<script>alert(1)</script> & Co"));
    }

    #[test]
    fn missing_values_render_empty_and_are_reported_once() {
        let t = template("{{ a }} {{ b }}", "{{ b }}{{ c }}", None);
        let rendered = t.render(&vars(&[("a", "x")]));

        assert_eq!(rendered.subject, "x ");
        assert_eq!(rendered.body_html, "");
        assert_eq!(rendered.missing_variables, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn single_braces_are_left_alone() {
        let t = template("{ a } {{ }}", "body", None);
        let rendered = t.render(&TemplateVariables::new());
        assert_eq!(rendered.subject, "{ a } {{ }}");
    }

    #[test]
    fn placeholders_are_collected_across_parts() {
        let t = template("{{ b }}", "{{ a }} {{ b }}", Some("{{ c }}"));
        assert_eq!(t.placeholders(), vec!["a", "b", "c"]);
    }

    #[test]
    fn template_key_must_be_snake_case() {
        let mut t = template("s", "b", None);
        assert!(t.validate().is_ok());
        t.template_key = "Request Approved".to_string();
        assert!(t.validate().is_err());
    }

    #[test]
    fn every_notified_event_has_a_default_template() {
        let defaults = default_templates(TenantId::new());
        for event_type in [
            "requests.request.approved",
            "requests.request.rejected",
            "purchasing.order.approved",
            "invoicing.invoice.approved",
            "rfp.rfp.awarded",
        ] {
            let key = template_key_for_event(event_type).unwrap();
            let t = defaults.iter().find(|t| t.template_key == key).unwrap();
            assert!(t.validate().is_ok());
            assert_eq!(t.placeholders(), {
                let mut v = t.variables.clone();
                v.sort();
                v
            });
        }
        assert_eq!(template_key_for_event("rfp.rfp.created"), None);
    }

    #[test]
    fn json_scalars_become_variables() {
        let value = serde_json::json!({
            "po_number": "PO-2026-0001",
            "total_amount": 475.5,
            "lines": [1, 2],
            "note": null,
        });
        let vars = variables_from_json(&value);
        assert_eq!(vars.get("po_number").map(String::as_str), Some("PO-2026-0001"));
        assert_eq!(vars.get("total_amount").map(String::as_str), Some("475.5"));
        assert!(!vars.contains_key("lines"));
        assert!(!vars.contains_key("note"));
    }

    proptest! {
        #[test]
        fn text_without_placeholders_is_unchanged(s in "[^{}]*") {
            let mut missing = Vec::new();
            prop_assert_eq!(render_text(&s, &TemplateVariables::new(), &mut missing), s);
            prop_assert!(missing.is_empty());
        }
    }
}
