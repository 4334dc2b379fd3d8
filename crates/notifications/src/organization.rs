use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, RecordId, TableBacked, TenantId};

/// Organization profile (`organization_settings`), one row per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    pub tenant_id: TenantId,
    pub name: String,
    /// ISO 4217 code.
    pub currency: String,
    /// 1 = January.
    pub fiscal_year_start_month: u32,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl OrganizationSettings {
    pub fn defaults(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            name: String::new(),
            currency: "USD".to_string(),
            fiscal_year_start_month: 1,
            address: None,
            contact_email: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        DomainError::require_text("name", &self.name)?;
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::validation("currency must be a 3-letter ISO code"));
        }
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(DomainError::validation(
                "fiscal_year_start_month must be between 1 and 12",
            ));
        }
        if let Some(email) = &self.contact_email {
            if !email.contains('@') {
                return Err(DomainError::validation("contact_email must be an email address"));
            }
        }
        Ok(())
    }

    /// Fiscal year containing `date`: `"2026"` for calendar years, otherwise
    /// `"2025-26"` (named by its start year).
    pub fn fiscal_year_label(&self, date: NaiveDate) -> String {
        if self.fiscal_year_start_month <= 1 {
            return date.year().to_string();
        }
        let start_year = if date.month() >= self.fiscal_year_start_month {
            date.year()
        } else {
            date.year() - 1
        };
        format!("{start_year}-{:02}", (start_year + 1).rem_euclid(100))
    }
}

impl TableBacked for OrganizationSettings {
    const TABLE: &'static str = "organization_settings";

    fn row_id(&self) -> RecordId {
        RecordId::singleton(self.tenant_id)
    }
}
