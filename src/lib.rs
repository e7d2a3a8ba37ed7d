//! Dockhand - Docker management service
//!
//! REST surface over containers, images, networks, volumes and compose
//! stacks, with background jobs for the slow operations and WebSocket
//! links to remote agents.

pub mod api;
pub mod compose;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod services;
pub mod state;
pub mod transport;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;
use crate::state::{get_shutdown_token, trigger_shutdown, AppState};

/// Settings taken from the command line, layered over the environment
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfig {
    pub port_override: Option<u16>,
}

/// Initialize logging, build the state and serve until shutdown
pub async fn init_and_run(runtime: RuntimeConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = EnvConfig::from_env();
    if let Some(port) = runtime.port_override {
        config.port = port;
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config));

    // Background services stop via the global shutdown token
    let agent_handles = services::agent_link::spawn_links(state.clone());
    let cleaner = services::cleaner::spawn(state.clone());

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind");
            return;
        }
    };

    info!(addr = %addr, version = %config::env::constants::VERSION, "dockhand listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = serve.await {
        error!(error = %e, "Server error");
    }

    // Shutdown was requested, let the background tasks wind down
    trigger_shutdown();
    for handle in &agent_handles {
        handle.close();
    }
    let _ = cleaner.await;
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    let shutdown = get_shutdown_token();

    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
        _ = shutdown.cancelled() => info!("Shutdown triggered"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_signal_completes_on_trigger() {
        // trigger_shutdown is a no-op until the token exists
        let _ = get_shutdown_token();
        trigger_shutdown();
        tokio::time::timeout(Duration::from_secs(2), shutdown_signal())
            .await
            .expect("shutdown signal did not resolve");
    }
}
