//! Stack management API
//!
//! Stacks are compose projects found in the stacks directory. Up/down
//! run as background jobs, one at a time per stack; a second request is
//! queued behind the running one.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::compose;
use crate::config::env::constants::MAX_QUEUE_SIZE;
use crate::domain::job::{Job, JobKind, JobStatus};
use crate::domain::stack::{
    StackServicesResponse, StackSummary, StacksResponse, ValidateRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::services;
use crate::state::{AppState, QueuedJob};

/// Response for POST /stacks/:name/up and /down
#[derive(Debug, Serialize)]
pub struct StackJobResponse {
    pub job_id: String,
    pub stack: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    pub stream_url: String,
}

#[derive(Debug, Serialize)]
struct QueueStatusResponse {
    stack: String,
    running_job_id: Option<String>,
    queue_length: usize,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stacks", get(list_stacks))
        .route("/stacks/validate", post(validate_compose))
        .route("/stacks/:name", get(get_stack))
        .route("/stacks/:name/services", get(get_stack_services))
        .route("/stacks/:name/queue", get(get_queue_status))
        .route("/stacks/:name/up", post(stack_up))
        .route("/stacks/:name/down", post(stack_down))
        .route("/stacks/:name/cancel", post(cancel_stack_job))
}

/// GET /stacks - no auth
async fn list_stacks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut stacks = Vec::new();
    for name in state.list_stacks().await {
        stacks.push(stack_summary(&state, &name).await);
    }
    Json(StacksResponse { stacks })
}

/// GET /stacks/:name - no auth
async fn get_stack(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if state.stack_compose_file(&name).is_none() {
        return Err(ApiError::not_found(format!("Stack '{}'", name)));
    }
    Ok(Json(stack_summary(&state, &name).await))
}

async fn stack_summary(state: &AppState, name: &str) -> StackSummary {
    let compose_file = state
        .stack_compose_file(name)
        .and_then(|p| p.file_name().map(|f| f.to_string_lossy().into_owned()))
        .map(|file| format!("{}/{}", name, file))
        .unwrap_or_default();

    // Best effort: a stack with a broken compose file still shows up,
    // just without service names
    let services = match read_normalized(state, name).await {
        Ok(normalized) => normalized.deploy_order,
        Err(_) => Vec::new(),
    };

    StackSummary {
        name: name.to_string(),
        compose_file,
        services,
        active_job_id: state.get_running_job_id(name).await,
    }
}

async fn read_normalized(
    state: &AppState,
    name: &str,
) -> Result<compose::NormalizedCompose, ApiError> {
    let path = state
        .stack_compose_file(name)
        .ok_or_else(|| ApiError::not_found(format!("Stack '{}'", name)))?;
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read compose file: {}", e)))?;
    let vars: BTreeMap<String, String> = std::env::vars().collect();
    Ok(compose::load(&content, &vars)?)
}

/// POST /stacks/validate - no auth
///
/// Parses and normalizes a compose document without touching the
/// engine. Request vars override the process environment for
/// interpolation.
async fn validate_compose(
    State(_state): State<Arc<AppState>>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut vars: BTreeMap<String, String> = std::env::vars().collect();
    vars.extend(request.vars);

    let normalized = compose::load(&request.content, &vars)?;
    Ok(Json(serde_json::json!({
        "valid": true,
        "compose": normalized,
    })))
}

/// GET /stacks/:name/services - live `compose ps` rows, no auth
async fn get_stack_services(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let path = state
        .stack_compose_file(&name)
        .ok_or_else(|| ApiError::not_found(format!("Stack '{}'", name)))?;

    let services = state
        .docker
        .compose_services(&path.display().to_string(), &name)
        .await?;

    Ok(Json(StackServicesResponse {
        stack: name,
        services,
    }))
}

/// GET /stacks/:name/queue - no auth
async fn get_queue_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let running_job_id = state.get_running_job_id(&name).await;
    let queue_length = state.queue_length(&name).await;

    Json(QueueStatusResponse {
        stack: name,
        running_job_id,
        queue_length,
    })
}

/// POST /stacks/:name/up - requires API key
async fn stack_up(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    start_stack_job(state, name, JobKind::StackUp).await
}

/// POST /stacks/:name/down - requires API key
async fn stack_down(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    start_stack_job(state, name, JobKind::StackDown).await
}

async fn start_stack_job(
    state: Arc<AppState>,
    stack: String,
    kind: JobKind,
) -> ApiResult<Json<StackJobResponse>> {
    if state.stack_compose_file(&stack).is_none() {
        return Err(ApiError::not_found(format!("Stack '{}'", stack)));
    }
    if state.job_store.is_at_capacity().await {
        return Err(ApiError::service_unavailable("Too many active jobs"));
    }

    let job_id = uuid::Uuid::new_v4().to_string();

    // Claiming the slot and checking for a running job is one atomic
    // step; losing the claim means another job holds the stack
    if state.try_register_running_job(&stack, &job_id).await.is_none() {
        let queue_len = state.queue_length(&stack).await;
        if queue_len >= MAX_QUEUE_SIZE {
            return Err(ApiError::conflict(format!(
                "Job queue for '{}' is full (max {})",
                stack, MAX_QUEUE_SIZE
            )));
        }

        let job = Job::new_queued(job_id.clone(), kind, stack.clone());
        state.job_store.create(job).await;

        let position = state
            .enqueue_job(
                &stack,
                QueuedJob {
                    job_id: job_id.clone(),
                    kind,
                    queued_at: Utc::now(),
                },
            )
            .await;

        tracing::info!(
            job_id = %job_id,
            stack = %stack,
            kind = %kind.as_str(),
            queue_position = position,
            "Stack job queued"
        );

        return Ok(Json(StackJobResponse {
            job_id,
            stack,
            status: JobStatus::Queued.as_str().to_string(),
            queue_position: Some(position),
            stream_url: String::new(),
        }));
    }

    let job = Job::new(job_id.clone(), kind, stack.clone());
    state.job_store.create(job).await;
    state.log_hub.create(&job_id).await;

    tracing::info!(job_id = %job_id, stack = %stack, kind = %kind.as_str(), "Stack job started");

    let response = StackJobResponse {
        job_id: job_id.clone(),
        stack: stack.clone(),
        status: JobStatus::Running.as_str().to_string(),
        queue_position: None,
        stream_url: format!("/jobs/{}/logs/stream", job_id),
    };

    let state_clone = state.clone();
    tokio::spawn(async move {
        services::jobs::execute(state_clone, job_id, kind, stack).await;
    });

    Ok(Json(response))
}

/// POST /stacks/:name/cancel - requires API key
async fn cancel_stack_job(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job_id = state
        .get_running_job_id(&name)
        .await
        .ok_or_else(|| ApiError::not_found(format!("No running job for stack '{}'", name)))?;

    state.cancel_job(&name).await;
    tracing::info!(job_id = %job_id, stack = %name, "Cancel requested");

    Ok(Json(serde_json::json!({
        "stack": name,
        "job_id": job_id,
        "action": "cancel",
    })))
}
