use thiserror::Error;

use procura_core::TenantId;

use crate::{Permission, PrincipalId, TenantMembership};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal within its active tenant. Pure policy check.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    if principal
        .membership
        .permissions
        .iter()
        .any(|held| held.grants(required))
    {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, permissions_for_roles};

    fn principal_with(tenant_id: TenantId, roles: &[&'static str]) -> Principal {
        let roles: Vec<Role> = roles.iter().map(|r| Role::new(*r)).collect();
        Principal {
            principal_id: PrincipalId::new(),
            active_tenant_id: tenant_id,
            membership: TenantMembership {
                tenant_id,
                permissions: permissions_for_roles(&roles),
                roles,
            },
        }
    }

    #[test]
    fn finance_can_approve_invoices_but_not_award_rfps() {
        let p = principal_with(TenantId::new(), &["finance"]);
        assert!(authorize(&p, &Permission::new("invoices.approve")).is_ok());
        assert_eq!(
            authorize(&p, &Permission::new("rfps.award")),
            Err(AuthzError::Forbidden("rfps.award".to_string()))
        );
    }

    #[test]
    fn admin_has_everything() {
        let p = principal_with(TenantId::new(), &["admin"]);
        assert!(authorize(&p, &Permission::new("settings.email.write")).is_ok());
    }

    #[test]
    fn membership_in_other_tenant_is_rejected() {
        let mut p = principal_with(TenantId::new(), &["admin"]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(
            authorize(&p, &Permission::new("budgets.read")),
            Err(AuthzError::TenantMismatch)
        );
    }
}
