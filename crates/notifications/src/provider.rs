//! Outgoing mail provider settings (`email_provider_settings`), one row per tenant.

use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, RecordId, TableBacked, TenantId};

/// Stored settings. `password` never leaves the service; read endpoints
/// return [`EmailProviderView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailProviderSettings {
    pub tenant_id: TenantId,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_tls")]
    pub use_tls: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_email: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

fn default_tls() -> bool {
    true
}

/// Read model without the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailProviderView {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub has_password: bool,
    pub from_email: String,
    pub from_name: Option<String>,
    pub is_active: bool,
}

/// Write payload. A missing `password` keeps the stored one; an empty string clears it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderUpdate {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_tls")]
    pub use_tls: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_email: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl EmailProviderSettings {
    pub fn validate(&self) -> DomainResult<()> {
        DomainError::require_text("host", &self.host)?;
        if self.port == 0 {
            return Err(DomainError::validation("port must be between 1 and 65535"));
        }
        if !self.from_email.contains('@') {
            return Err(DomainError::validation("from_email must be an email address"));
        }
        Ok(())
    }

    /// Apply an update on top of the current row (or create one).
    pub fn apply_update(tenant_id: TenantId, current: Option<&Self>, update: ProviderUpdate) -> DomainResult<Self> {
        let password = match update.password {
            None => current.and_then(|c| c.password.clone()),
            Some(p) if p.is_empty() => None,
            Some(p) => Some(p),
        };
        let settings = Self {
            tenant_id,
            host: update.host.trim().to_string(),
            port: update.port,
            use_tls: update.use_tls,
            username: update.username.filter(|u| !u.trim().is_empty()),
            password,
            from_email: update.from_email.trim().to_string(),
            from_name: update.from_name,
            is_active: update.is_active,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn view(&self) -> EmailProviderView {
        EmailProviderView {
            host: self.host.clone(),
            port: self.port,
            use_tls: self.use_tls,
            username: self.username.clone(),
            has_password: self.password.is_some(),
            from_email: self.from_email.clone(),
            from_name: self.from_name.clone(),
            is_active: self.is_active,
        }
    }

    /// `"Name <addr>"` when a display name is set.
    pub fn from_header(&self) -> String {
        match self.from_name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => format!("{name} <{}>", self.from_email),
            None => self.from_email.clone(),
        }
    }
}

impl TableBacked for EmailProviderSettings {
    const TABLE: &'static str = "email_provider_settings";

    fn row_id(&self) -> RecordId {
        RecordId::singleton(self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(password: Option<&str>) -> ProviderUpdate {
        ProviderUpdate {
            host: "smtp.example.com".to_string(),
            port: 587,
            use_tls: true,
            username: Some("mailer".to_string()),
            password: password.map(str::to_string),
            from_email: "noreply@example.com".to_string(),
            from_name: Some("Procurement".to_string()),
            is_active: true,
        }
    }

    #[test]
    fn password_is_kept_when_omitted_and_cleared_when_empty() {
        let tenant = TenantId::new();
        let first = EmailProviderSettings::apply_update(tenant, None, update(Some("s3cret"))).unwrap();
        assert_eq!(first.password.as_deref(), Some("s3cret"));

        let kept = EmailProviderSettings::apply_update(tenant, Some(&first), update(None)).unwrap();
        assert_eq!(kept.password.as_deref(), Some("s3cret"));

        let cleared = EmailProviderSettings::apply_update(tenant, Some(&kept), update(Some(""))).unwrap();
        assert_eq!(cleared.password, None);
    }

    #[test]
    fn view_hides_password() {
        let settings = EmailProviderSettings::apply_update(TenantId::new(), None, update(Some("s3cret"))).unwrap();
        let view = settings.view();
        assert!(view.has_password);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("s3cret"));
        assert_eq!(settings.from_header(), "Procurement <noreply@example.com>");
    }

    #[test]
    fn validation_rules() {
        let tenant = TenantId::new();
        let mut bad = update(None);
        bad.port = 0;
        assert!(EmailProviderSettings::apply_update(tenant, None, bad).is_err());

        let mut bad = update(None);
        bad.from_email = "not-an-address".to_string();
        assert!(EmailProviderSettings::apply_update(tenant, None, bad).is_err());

        let mut bad = update(None);
        bad.host = "  ".to_string();
        assert!(EmailProviderSettings::apply_update(tenant, None, bad).is_err());
    }
}
