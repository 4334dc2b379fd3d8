//! PO numbering settings (`standard_po_settings`), one row per tenant.

use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, RecordId, TableBacked, TenantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardPoSettings {
    pub tenant_id: TenantId,
    pub prefix: String,
    pub separator: String,
    pub include_year: bool,
    pub number_padding: u32,
    pub next_number: u64,
}

/// Result of reserving a PO number: the formatted number and the settings row
/// to write back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoNumberAllocation {
    pub po_number: String,
    pub updated: StandardPoSettings,
}

impl StandardPoSettings {
    pub fn defaults(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            prefix: "PO".to_string(),
            separator: "-".to_string(),
            include_year: true,
            number_padding: 4,
            next_number: 1,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        DomainError::require_text("prefix", &self.prefix)?;
        if self.separator.chars().count() > 3 {
            return Err(DomainError::validation("separator must be at most 3 characters"));
        }
        if !(1..=12).contains(&self.number_padding) {
            return Err(DomainError::validation("number_padding must be between 1 and 12"));
        }
        if self.next_number == 0 {
            return Err(DomainError::validation("next_number must be at least 1"));
        }
        Ok(())
    }

    /// `prefix [sep year] sep zero-padded(next_number, padding)`.
    pub fn format_po_number(&self, year: i32) -> String {
        let sequence = format!("{:0width$}", self.next_number, width = self.number_padding as usize);
        if self.include_year {
            format!("{}{sep}{year}{sep}{sequence}", self.prefix, sep = self.separator)
        } else {
            format!("{}{}{sequence}", self.prefix, self.separator)
        }
    }

    /// Reserve the current number and advance the counter.
    pub fn allocate(&self, year: i32) -> DomainResult<PoNumberAllocation> {
        let next_number = self
            .next_number
            .checked_add(1)
            .ok_or_else(|| DomainError::validation("po number sequence is exhausted; reset next_number"))?;
        Ok(PoNumberAllocation {
            po_number: self.format_po_number(year),
            updated: Self {
                next_number,
                ..self.clone()
            },
        })
    }
}

impl TableBacked for StandardPoSettings {
    const TABLE: &'static str = "standard_po_settings";

    fn row_id(&self) -> RecordId {
        RecordId::singleton(self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_with_and_without_year() {
        let mut settings = StandardPoSettings::defaults(TenantId::new());
        settings.next_number = 42;
        assert_eq!(settings.format_po_number(2026), "PO-2026-0042");

        settings.include_year = false;
        settings.prefix = "ACME".to_string();
        settings.separator = "/".to_string();
        settings.number_padding = 6;
        assert_eq!(settings.format_po_number(2026), "ACME/000042");
    }

    #[test]
    fn numbers_wider_than_padding_are_not_truncated() {
        let mut settings = StandardPoSettings::defaults(TenantId::new());
        settings.next_number = 123_456;
        assert_eq!(settings.format_po_number(2026), "PO-2026-123456");
    }

    #[test]
    fn allocate_advances_counter() {
        let settings = StandardPoSettings::defaults(TenantId::new());
        let first = settings.allocate(2026).unwrap();
        assert_eq!(first.po_number, "PO-2026-0001");
        let second = first.updated.allocate(2026).unwrap();
        assert_eq!(second.po_number, "PO-2026-0002");
        assert_eq!(second.updated.next_number, 3);
    }

    #[test]
    fn exhausted_sequence_is_a_validation_error() {
        let mut settings = StandardPoSettings::defaults(TenantId::new());
        settings.next_number = u64::MAX;
        assert!(matches!(settings.allocate(2026), Err(DomainError::Validation(_))));

        settings.next_number = u64::MAX - 1;
        let last = settings.allocate(2026).unwrap();
        assert_eq!(last.updated.next_number, u64::MAX);
    }

    #[test]
    fn validation_bounds() {
        let mut settings = StandardPoSettings::defaults(TenantId::new());
        assert!(settings.validate().is_ok());
        settings.number_padding = 0;
        assert!(settings.validate().is_err());
        settings.number_padding = 4;
        settings.prefix = " ".to_string();
        assert!(settings.validate().is_err());
    }

    proptest! {
        #[test]
        fn sequence_part_has_at_least_padding_digits(next in 1u64..10_000_000, padding in 1u32..=12) {
            let mut settings = StandardPoSettings::defaults(TenantId::new());
            settings.next_number = next;
            settings.number_padding = padding;
            let number = settings.format_po_number(2026);
            let sequence = number.rsplit('-').next().unwrap();
            prop_assert!(sequence.len() >= padding as usize);
            prop_assert_eq!(sequence.parse::<u64>().unwrap(), next);
        }
    }
}
