//! Network management API

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::domain::network::{CreateNetworkRequest, NetworksResponse};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/networks", get(list_networks))
        .route("/networks", post(create_network))
        .route("/networks/prune", post(prune_networks))
        .route("/networks/:name", delete(remove_network))
}

/// GET /networks - no auth
async fn list_networks(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let networks = state.docker.list_networks().await?;
    Ok(Json(NetworksResponse { networks }))
}

/// POST /networks - requires API key
async fn create_network(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateNetworkRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Network name must not be empty"));
    }
    let driver = request.driver.as_deref().unwrap_or("bridge");

    tracing::info!(network = %request.name, driver = %driver, "Creating network");
    state
        .docker
        .create_network(&request.name, driver, request.internal)
        .await?;

    Ok(Json(serde_json::json!({ "network": request.name, "action": "create" })))
}

/// DELETE /networks/:name - requires API key
async fn remove_network(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(network = %name, "Removing network");
    state.docker.remove_network(&name).await?;
    Ok(Json(serde_json::json!({ "network": name, "action": "remove" })))
}

/// POST /networks/prune - requires API key
async fn prune_networks(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let output = state.docker.prune_networks().await?;
    Ok(Json(serde_json::json!({
        "action": "prune",
        "output": output.trim(),
    })))
}
