mod bootstrap;
mod health;
mod storefront;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use storefront_core::config::{AppConfig, LoadOptions};
use tokio::{net::TcpListener, sync::Notify};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use storefront_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = app.config.listen_address();
    let listener = TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "storefront-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let server = axum::serve(listener, app.router())
        .with_graceful_shutdown(async move { signal.notified().await });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => {
            joined??;
            app.db_pool.close().await;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = app.config.server.graceful_shutdown_secs,
        "storefront-server draining in-flight requests"
    );
    shutdown.notify_one();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = app.config.server.graceful_shutdown_secs,
                "graceful shutdown window elapsed, aborting open connections"
            );
            server.abort();
        }
    }

    app.db_pool.close().await;
    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "storefront-server stopped"
    );

    Ok(())
}
