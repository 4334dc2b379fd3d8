use std::str::FromStr;

use axum::response::Response;

use procura_auth::Permission;
use procura_core::ExpectedVersion;

use crate::app::errors;
use crate::authz::authorize_permission;
use crate::context::{PrincipalContext, TenantContext};

/// Route-boundary permission check; the `Err` arm is the 403 response.
pub fn require(tenant: &TenantContext, principal: &PrincipalContext, permission: &'static str) -> Result<(), Response> {
    authorize_permission(tenant, principal, &Permission::new(permission)).map_err(|e| {
        tracing::debug!(permission, error = %e, "request forbidden");
        errors::forbidden(e)
    })
}

/// Parse a path segment into a typed id, answering 400 on garbage.
pub fn parse_id<I: FromStr>(raw: &str, what: &str) -> Result<I, Response> {
    raw.parse().map_err(|_| errors::invalid_id(what))
}

/// Client-supplied row version, or the version just read.
pub fn expected_version(client: Option<u64>, current: u64) -> ExpectedVersion {
    ExpectedVersion::Exact(client.unwrap_or(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use procura_requests::RequestId;

    #[test]
    fn bad_ids_are_bad_requests() {
        let err = parse_id::<RequestId>("nope", "request").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let id = RequestId::generate();
        assert_eq!(parse_id::<RequestId>(&id.to_string(), "request").unwrap(), id);
    }

    #[test]
    fn client_row_version_wins() {
        assert_eq!(expected_version(Some(2), 5), ExpectedVersion::Exact(2));
        assert_eq!(expected_version(None, 5), ExpectedVersion::Exact(5));
    }
}
