//! Job execution context

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::domain::job::{JobStage, JobStatus, LogLine};
use crate::state::AppState;

/// Everything a job runner needs: identity, log channel, cancellation
#[derive(Clone)]
pub struct JobContext {
    pub job_id: String,
    /// Stack name or image reference
    pub target: String,
    /// Set for stack jobs so the per-stack registry gets released
    pub stack: Option<String>,
    pub state: Arc<AppState>,
    pub log_tx: broadcast::Sender<LogLine>,
    pub cancel_token: CancellationToken,
}

impl JobContext {
    pub fn log_stdout(&self, content: &str) {
        let _ = self.log_tx.send(LogLine::stdout(content));
    }

    pub fn log_stderr(&self, content: &str) {
        let _ = self.log_tx.send(LogLine::stderr(content));
    }

    pub async fn update_stages(&self, stages: Vec<JobStage>) {
        self.state
            .job_store
            .update_stages(&self.job_id, stages)
            .await;
    }

    /// Complete the job: persist stages, move to history, close the log
    /// channel and release the stack slot.
    pub async fn finish(&self, status: JobStatus, exit_code: Option<i32>, stages: Vec<JobStage>) {
        self.update_stages(stages).await;
        self.state
            .job_store
            .finish(&self.job_id, status, exit_code)
            .await;
        self.state.log_hub.finish(&self.job_id).await;
        if let Some(ref stack) = self.stack {
            self.state.unregister_running_job(stack).await;
        }

        if self.state.webhook.is_configured() {
            if let Some(job) = self.state.job_store.get_any(&self.job_id).await {
                self.state.webhook.notify_job_finished(&job).await;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
