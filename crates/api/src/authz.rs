//! API-side authorization guard.
//!
//! Permissions are checked at the route boundary (before dispatch or any
//! store access), keeping domain aggregates and infra auth-agnostic.

use procura_auth::{AuthzError, Permission, Principal, TenantMembership, authorize, permissions_for_roles};

use crate::context::{PrincipalContext, TenantContext};

/// Check that the request's principal holds `required` in its tenant.
pub fn authorize_permission(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    required: &Permission,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_for_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    authorize(&principal, required)
}
