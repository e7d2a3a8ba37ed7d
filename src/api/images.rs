//! Image management API

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::image::{ImagesResponse, PullRequest};
use crate::domain::job::{Job, JobKind};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::services;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/images", get(list_images))
        .route("/images/pull", post(pull_image))
        .route("/images/prune", post(prune_images))
        .route("/images/:id", delete(remove_image))
}

/// GET /images - no auth
async fn list_images(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let images = state.docker.list_images().await?;
    Ok(Json(ImagesResponse { images }))
}

/// POST /images/pull - requires API key
///
/// Pulls run as a background job; the response carries the job id and
/// the SSE stream URL for progress.
async fn pull_image(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PullRequest>,
) -> ApiResult<impl IntoResponse> {
    let image = request.image.trim().to_string();
    if image.is_empty() {
        return Err(ApiError::bad_request("Image reference must not be empty"));
    }
    if state.job_store.is_at_capacity().await {
        return Err(ApiError::service_unavailable("Too many active jobs"));
    }

    let job_id = uuid::Uuid::new_v4().to_string();
    let job = Job::new(job_id.clone(), JobKind::ImagePull, image.clone());
    state.job_store.create(job).await;
    state.log_hub.create(&job_id).await;

    tracing::info!(job_id = %job_id, image = %image, "Image pull started");

    let state_clone = state.clone();
    let job_id_clone = job_id.clone();
    tokio::spawn(async move {
        services::jobs::execute(state_clone, job_id_clone, JobKind::ImagePull, image).await;
    });

    Ok(Json(serde_json::json!({
        "job_id": job_id,
        "status": "running",
        "stream_url": format!("/jobs/{}/logs/stream", job_id),
    })))
}

#[derive(Debug, Deserialize)]
struct RemoveQuery {
    #[serde(default)]
    force: bool,
}

/// DELETE /images/:id?force=true - requires API key
///
/// Image references with a slash must be URL-encoded.
async fn remove_image(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> ApiResult<impl IntoResponse> {
    tracing::info!(image = %id, force = query.force, "Removing image");
    state.docker.remove_image(&id, query.force).await?;
    Ok(Json(serde_json::json!({ "image": id, "action": "remove" })))
}

/// POST /images/prune - requires API key
async fn prune_images(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let output = state.docker.prune_images().await?;
    Ok(Json(serde_json::json!({
        "action": "prune",
        "output": output.trim(),
    })))
}
