//! Health endpoint

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    uptime_secs: i64,
    active_jobs: usize,
    stacks: Vec<String>,
    agents_connected: usize,
    agents_configured: usize,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(health_check))
        .route("/version", get(version))
}

/// GET /version - no auth
async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "dockhand",
        version: VERSION,
    })
}

/// GET /health - liveness plus a small state summary, no auth
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents = state.agents.snapshot().await;
    let agents_connected = agents.iter().filter(|a| a.connected).count();

    Json(HealthResponse {
        status: "ok",
        service: "dockhand",
        version: VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
        active_jobs: state.job_store.active_count().await,
        stacks: state.list_stacks().await,
        agents_connected,
        agents_configured: agents.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_version_reports_package_metadata() {
        let body = version().await.0;
        assert_eq!(body.service, "dockhand");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
