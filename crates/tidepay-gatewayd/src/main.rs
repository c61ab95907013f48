//! Tidepay gateway daemon
//!
//! Wires the engine facade, the background sync watchdog and the REST
//! surface into one process. Configuration comes entirely from `TIDEPAY_*`
//! environment variables; see [`env_vars`].

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use tidepay::engine::fake::FakeConnector;
use tidepay::{EngineConnector, Gateway, PaymentNotifier, SyncWatchdog, WebhookNotifier};

mod config;
mod env_vars;
mod routes;

use config::{EngineBackend, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    let connector: Arc<dyn EngineConnector> = match settings.backend {
        EngineBackend::Fake => {
            tracing::warn!("using the fake engine backend, payments are simulated");
            Arc::new(FakeConnector::new(true))
        }
    };

    let gateway = Arc::new(Gateway::new(connector, settings.engine.clone()));
    match gateway.handler().await {
        Ok(_) => tracing::info!("payment system initialized during startup"),
        // The first request retries initialization, so startup continues
        Err(e) => tracing::error!("payment system failed to initialize during startup: {}", e),
    }

    let notifier: Option<Arc<dyn PaymentNotifier>> = match &settings.webhook {
        Some(webhook) => {
            tracing::info!("merchant webhook notifications enabled: {}", webhook.url);
            Some(Arc::new(WebhookNotifier::new(
                &webhook.url,
                webhook.secret.clone(),
            )?))
        }
        None => None,
    };

    let watchdog = SyncWatchdog::new(gateway.clone(), notifier, settings.watchdog.clone());
    let shutdown = watchdog.shutdown_token();
    let watchdog_handle = watchdog.spawn();
    tracing::info!("background sync watchdog started");

    let state = routes::AppState {
        gateway: gateway.clone(),
        api_secret: settings.api_secret.clone().into(),
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;
    tracing::info!("listening on {}", settings.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    shutdown.cancel();
    let _ = watchdog_handle.await;
    gateway.disconnect().await;
    tracing::info!("payment system disconnected during shutdown");

    Ok(())
}
