use std::sync::Arc;

use anyhow::Context;
use tokio::runtime::Handle;

use procura_api::app::{router_with, services::build_services};
use procura_infra::config::AppConfig;
use procura_infra::workers::{NotificationHandler, spawn_notification_worker};
use procura_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_with_dotenv().context("loading configuration")?;
    procura_observability::init_with(LogFormat::parse(&config.log_format), None);

    let services = Arc::new(build_services(&config).await.context("connecting the record store")?);

    let notifications = if config.notifications_enabled {
        let handler = NotificationHandler::new(services.shared_store(), services.shared_mailer());
        Some(
            spawn_notification_worker(&**services.bus(), handler, Handle::current())
                .context("starting the notification worker")?,
        )
    } else {
        tracing::info!("notifications disabled");
        None
    };

    let app = router_with(services, config.jwt_secret.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("serving http")?;

    if let Some(worker) = notifications {
        tokio::task::spawn_blocking(move || worker.shutdown()).await?;
    }
    Ok(())
}
