mod api;
mod config;
mod error;
mod logging;
mod resolver;
mod state;
mod types;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::{net::TcpListener, signal};

use crate::{
    config::{Config, LogFormat},
    resolver::ChainResolver,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _log_guard = logging::init(LogFormat::from_env()?);

    let config = Config::load().context("failed to load configuration")?;
    let resolver = ChainResolver::new(&config).context("failed to build upstream client")?;
    let state = AppState::new(Arc::new(resolver), &config);

    // app routes
    let app = api::routes::router(state.clone(), config.request_timeout);

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    tracing::info!(addr = %config.server_addr, "URL resolver listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("server error")?;

    tracing::info!("URL resolver stopped");
    Ok(())
}

// resolves on Ctrl-C or SIGTERM, then stops admitting new resolutions
async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
    state.permits.close();
}
