//! Job status and log streaming API

use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::job::Job;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobHistoryQuery {
    /// Result limit, default 20
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Filter by stack name or image reference
    pub target: Option<String>,
    /// Filter by status (queued, running, success, failed, cancelled)
    pub status: Option<String>,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct JobHistoryResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/recent", get(get_recent_jobs))
        .route("/jobs/:job_id", get(get_job_status))
        .route("/jobs/:job_id/logs/stream", get(stream_logs))
}

/// GET /jobs/:job_id - active or historical, no auth
async fn get_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state
        .job_store
        .get_any(&job_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Job '{}'", job_id)))?;

    Ok(Json(job))
}

/// GET /jobs/recent - running jobs first, then history, no auth
async fn get_recent_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobHistoryQuery>,
) -> impl IntoResponse {
    let history = state
        .job_store
        .get_history(query.limit, query.target.as_deref(), query.status.as_deref())
        .await;

    let mut jobs: Vec<Job> = state
        .job_store
        .get_all()
        .await
        .into_iter()
        .filter(|job| !job.status.is_terminal())
        .collect();
    jobs.extend(history);

    let filtered: Vec<Job> = jobs
        .into_iter()
        .filter(|job| {
            let target_match = query.target.as_ref().map_or(true, |t| job.target == *t);
            let status_match = query
                .status
                .as_ref()
                .map_or(true, |s| job.status.as_str() == s);
            target_match && status_match
        })
        .take(query.limit)
        .collect();

    let total = filtered.len();
    Json(JobHistoryResponse {
        jobs: filtered,
        total,
    })
}

/// GET /jobs/:job_id/logs/stream - SSE, no auth
///
/// Streams `LogLine`s as they happen; a final `complete` event carries
/// the terminal status and exit code.
async fn stream_logs(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let mut rx = state.log_hub.subscribe(&job_id).await.ok_or_else(|| {
        ApiError::not_found(format!("Job '{}' not found or already completed", job_id))
    })?;

    let state_clone = state.clone();
    let job_id_clone = job_id.clone();

    let stream = async_stream::stream! {
        loop {
            // The recv timeout doubles as a poll for the finished flag,
            // so the stream closes out once the job is done and drained
            match tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv()).await {
                Ok(Ok(log_line)) => {
                    let json = serde_json::to_string(&log_line).unwrap_or_default();
                    yield Ok(Event::default().data(json));
                }
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!(job_id = %job_id_clone, lagged = n, "Log subscriber lagged");
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    yield complete_event(&state_clone, &job_id_clone).await;
                    break;
                }
                Err(_) => {
                    if state_clone.log_hub.is_finished(&job_id_clone).await {
                        yield complete_event(&state_clone, &job_id_clone).await;
                        break;
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}

async fn complete_event(state: &AppState, job_id: &str) -> Result<Event, Infallible> {
    let payload = match state.job_store.get_any(job_id).await {
        Some(job) => serde_json::json!({
            "status": job.status.as_str(),
            "exit_code": job.exit_code,
        }),
        None => serde_json::json!({ "status": "unknown" }),
    };
    Ok(Event::default().event("complete").data(payload.to_string()))
}
