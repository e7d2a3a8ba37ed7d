//! Periodic state cleanup
//!
//! Reaps stale jobs, finished log channels and queue entries that waited
//! too long for their stack's slot.

use std::sync::Arc;
use tracing::info;

use crate::config::env::constants::{CLEANUP_INTERVAL_SECS, QUEUE_TIMEOUT_SECS};
use crate::domain::job::JobStatus;
use crate::state::{get_shutdown_token, AppState};

const LOG_CHANNEL_MAX_AGE_HOURS: i64 = 24;

pub fn spawn(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let shutdown = get_shutdown_token();
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
        // the first tick fires immediately, skip it
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => run_once(&state).await,
            }
        }
    })
}

async fn run_once(state: &AppState) {
    state.job_store.cleanup_stale().await;
    state.log_hub.cleanup().await;
    state.log_hub.cleanup_expired(LOG_CHANNEL_MAX_AGE_HOURS).await;

    // Queued jobs that expired never ran, mark them failed so clients
    // polling the job see a terminal state
    let expired = state
        .cleanup_expired_queue_items(QUEUE_TIMEOUT_SECS)
        .await;
    for (stack, job_id) in expired {
        info!(stack = %stack, job_id = %job_id, "Expiring queued job");
        state
            .job_store
            .finish(&job_id, JobStatus::Failed, Some(-3))
            .await;
        state.log_hub.finish(&job_id).await;
    }
}
