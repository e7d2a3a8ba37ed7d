//! Volume management API

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::domain::volume::{CreateVolumeRequest, VolumesResponse};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/volumes", get(list_volumes))
        .route("/volumes", post(create_volume))
        .route("/volumes/prune", post(prune_volumes))
        .route("/volumes/:name", delete(remove_volume))
}

/// GET /volumes - no auth
async fn list_volumes(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let volumes = state.docker.list_volumes().await?;
    Ok(Json(VolumesResponse { volumes }))
}

/// POST /volumes - requires API key
async fn create_volume(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateVolumeRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Volume name must not be empty"));
    }
    let driver = request.driver.as_deref().unwrap_or("local");

    tracing::info!(volume = %request.name, driver = %driver, "Creating volume");
    state.docker.create_volume(&request.name, driver).await?;

    Ok(Json(serde_json::json!({ "volume": request.name, "action": "create" })))
}

/// DELETE /volumes/:name - requires API key
async fn remove_volume(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(volume = %name, "Removing volume");
    state.docker.remove_volume(&name).await?;
    Ok(Json(serde_json::json!({ "volume": name, "action": "remove" })))
}

/// POST /volumes/prune - requires API key
async fn prune_volumes(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let output = state.docker.prune_volumes().await?;
    Ok(Json(serde_json::json!({
        "action": "prune",
        "output": output.trim(),
    })))
}
