//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failures (validation, lifecycle violations,
/// conflicts). Storage and transport failures live in `procura-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed a form-level check (required field, numeric range).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lifecycle rule or cross-field invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Stale version or duplicate creation.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Reject a blank required text field.
    pub fn require_text(field: &str, value: &str) -> DomainResult<()> {
        if value.trim().is_empty() {
            return Err(Self::validation(format!("{field} is required")));
        }
        Ok(())
    }

    /// Reject negative or non-finite amounts.
    pub fn require_non_negative(field: &str, value: f64) -> DomainResult<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(Self::validation(format!("{field} must be a non-negative number")));
        }
        Ok(())
    }

    /// Reject percentages outside `0..=100`.
    pub fn require_percentage(field: &str, value: f64) -> DomainResult<()> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(Self::validation(format!("{field} must be between 0 and 100")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_checks() {
        assert!(DomainError::require_text("title", "  ").is_err());
        assert!(DomainError::require_text("title", "Laptops").is_ok());
        assert!(DomainError::require_non_negative("amount", -0.01).is_err());
        assert!(DomainError::require_non_negative("amount", f64::NAN).is_err());
        assert!(DomainError::require_percentage("tax_rate", 100.0).is_ok());
        assert_eq!(
            DomainError::require_percentage("tax_rate", 101.0),
            Err(DomainError::Validation("tax_rate must be between 0 and 100".into()))
        );
    }
}
