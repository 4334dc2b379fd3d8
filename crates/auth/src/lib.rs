//! `procura-auth`: authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: tokens come in as strings, decisions go
//! out as `Result<(), AuthzError>`.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use policy::permissions_for_roles;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
