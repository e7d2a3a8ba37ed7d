//! Container management API

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::container::{
    ContainerEnvResponse, ContainerLogsQuery, ContainerLogsResponse, ContainersResponse, EnvVar,
};
use crate::error::ApiResult;
use crate::middleware::RequireApiKey;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/containers", get(list_containers))
        .route("/containers/:name", get(inspect_container))
        .route("/containers/:name", delete(remove_container))
        .route("/containers/:name/logs", get(container_logs))
        .route("/containers/:name/env", get(container_env))
        .route("/containers/:name/start", post(start_container))
        .route("/containers/:name/stop", post(stop_container))
        .route("/containers/:name/restart", post(restart_container))
}

/// GET /containers - all containers including stopped ones, no auth
async fn list_containers(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let containers = state.docker.list_containers().await?;
    Ok(Json(ContainersResponse { containers }))
}

/// GET /containers/:name - raw `docker inspect` document, no auth
async fn inspect_container(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let details = state.docker.inspect_container(&name).await?;
    Ok(Json(details))
}

/// GET /containers/:name/logs?tail=&timestamps=&since=
async fn container_logs(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ContainerLogsQuery>,
) -> ApiResult<impl IntoResponse> {
    let logs = state
        .docker
        .container_logs(&name, query.tail, query.timestamps, query.since.as_deref())
        .await?;

    let total_lines = logs.len();
    Ok(Json(ContainerLogsResponse {
        container: name,
        logs,
        total_lines,
    }))
}

/// GET /containers/:name/env - requires API key, values of
/// credential-looking variables are masked
async fn container_env(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let raw = state.docker.container_env(&name).await?;

    let env_vars = raw
        .into_iter()
        .map(|(key, value)| {
            let sensitive = EnvVar::is_sensitive_key(&key);
            let value = if sensitive { "********".to_string() } else { value };
            EnvVar::new(key, value, sensitive)
        })
        .collect();

    Ok(Json(ContainerEnvResponse {
        container: name,
        env_vars,
    }))
}

/// POST /containers/:name/start - requires API key
async fn start_container(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(container = %name, "Starting container");
    state.docker.start_container(&name).await?;
    Ok(Json(serde_json::json!({ "container": name, "action": "start" })))
}

/// POST /containers/:name/stop - requires API key
async fn stop_container(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(container = %name, "Stopping container");
    state.docker.stop_container(&name).await?;
    Ok(Json(serde_json::json!({ "container": name, "action": "stop" })))
}

/// POST /containers/:name/restart - requires API key
async fn restart_container(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(container = %name, "Restarting container");
    state.docker.restart_container(&name).await?;
    Ok(Json(serde_json::json!({ "container": name, "action": "restart" })))
}

#[derive(Debug, Deserialize)]
struct RemoveQuery {
    #[serde(default)]
    force: bool,
}

/// DELETE /containers/:name?force=true - requires API key
async fn remove_container(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(container = %name, force = query.force, "Removing container");
    state.docker.remove_container(&name, query.force).await?;
    Ok(Json(serde_json::json!({ "container": name, "action": "remove" })))
}
