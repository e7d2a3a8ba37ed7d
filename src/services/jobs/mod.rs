//! Background job execution
//!
//! Jobs run detached from the HTTP request that created them. Stack jobs
//! hold the stack's slot in `running_jobs`; once one finishes, the next
//! queued job for that stack is started.

pub mod context;
pub mod image_pull;
pub mod stack_down;
pub mod stack_up;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::env::constants::JOB_TIMEOUT_SECS;
use crate::domain::job::{JobKind, JobStage, JobStatus, StageStatus};
use crate::state::AppState;

pub use context::JobContext;

/// Run a job to completion, then drain the stack's queue
pub async fn execute(state: Arc<AppState>, job_id: String, kind: JobKind, target: String) {
    execute_single(state.clone(), job_id, kind, target.clone()).await;

    if matches!(kind, JobKind::StackUp | JobKind::StackDown) {
        process_queue(state, target).await;
    }
}

async fn execute_single(state: Arc<AppState>, job_id: String, kind: JobKind, target: String) {
    let log_tx = state.log_hub.create(&job_id).await;

    // Stack jobs reuse the token registered with the stack slot so
    // POST /stacks/:name/cancel reaches the running process
    let stack = matches!(kind, JobKind::StackUp | JobKind::StackDown).then(|| target.clone());
    let cancel_token = match stack {
        Some(ref stack) => state
            .running_jobs
            .read()
            .await
            .get(stack)
            .map(|j| j.cancel_token.clone())
            .unwrap_or_else(CancellationToken::new),
        None => CancellationToken::new(),
    };

    let ctx = JobContext {
        job_id: job_id.clone(),
        target,
        stack,
        state: state.clone(),
        log_tx,
        cancel_token: cancel_token.clone(),
    };

    let timeout_task = spawn_timeout(job_id, cancel_token);

    match kind {
        JobKind::StackUp => stack_up::execute(&ctx).await,
        JobKind::StackDown => stack_down::execute(&ctx).await,
        JobKind::ImagePull => image_pull::execute(&ctx).await,
    }

    timeout_task.abort();
}

/// Start queued jobs for a stack until the queue is empty
async fn process_queue(state: Arc<AppState>, stack: String) {
    loop {
        let Some(next) = state.dequeue_job(&stack).await else {
            break;
        };

        // A concurrent request may have claimed the slot since this
        // job's predecessor released it; if so, put the item back and
        // let that job's own queue drain pick it up
        if state
            .try_register_running_job(&stack, &next.job_id)
            .await
            .is_none()
        {
            state.requeue_front(&stack, next).await;
            break;
        }

        tracing::info!(
            job_id = %next.job_id,
            stack = %stack,
            "Starting queued job"
        );

        state
            .job_store
            .update_status(&next.job_id, JobStatus::Running, None)
            .await;
        state.log_hub.create(&next.job_id).await;

        execute_single(state.clone(), next.job_id, next.kind, stack.clone()).await;
    }
}

/// Cancel the job if it outlives the global timeout
fn spawn_timeout(job_id: String, cancel_token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(JOB_TIMEOUT_SECS)).await;
        tracing::error!(job_id = %job_id, "Job timed out after {} minutes", JOB_TIMEOUT_SECS / 60);
        cancel_token.cancel();
    })
}

/// Write a one-line-per-stage summary into the job log
pub(crate) fn stage_summary(ctx: &JobContext, stages: &[JobStage]) {
    ctx.log_stdout("");
    ctx.log_stdout("=== Stage Summary ===");
    for stage in stages {
        let duration = stage
            .duration_ms
            .map(|d| format!("{}ms", d))
            .unwrap_or_else(|| "-".to_string());
        let status_icon = match stage.status {
            StageStatus::Success => "✓",
            StageStatus::Failed => "✗",
            StageStatus::Skipped => "⊘",
            StageStatus::Running => "⟳",
            StageStatus::Pending => "○",
        };
        ctx.log_stdout(&format!("{} {} ({})", status_icon, stage.display_name, duration));
    }
}
