//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: record store, event bus, dispatcher and mailer
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON response helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use procura_infra::OutboxMailer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Self-contained router over in-memory services (dev and tests).
pub fn build_app(jwt_secret: String) -> Router {
    let services = Arc::new(services::AppServices::in_memory(Arc::new(OutboxMailer::new())));
    router_with(services, jwt_secret)
}

/// Full HTTP router over the given services (public entrypoint used by `main.rs`).
pub fn router_with(services: Arc<services::AppServices>, jwt_secret: String) -> Router {
    let jwt = Arc::new(procura_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require auth + tenant context.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
