use axum::{routing::get, Router};

pub mod budgets;
pub mod common;
pub mod invoices;
pub mod purchases;
pub mod requests;
pub mod rfps;
pub mod settings;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/budgets", budgets::router())
        .nest("/requests", requests::router())
        .nest("/purchases", purchases::router())
        .nest("/invoices", invoices::router())
        .nest("/rfps", rfps::router())
        .nest("/settings", settings::router())
}
