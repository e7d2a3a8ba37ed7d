//! Image pull job

use std::path::Path;
use std::time::Duration;

use crate::config::env::constants::JOB_TIMEOUT_SECS;
use crate::domain::job::{JobStage, JobStatus};
use crate::infra::{CommandError, CommandRunner};

use super::context::JobContext;
use super::stage_summary;

pub async fn execute(ctx: &JobContext) {
    let image = ctx.target.clone();
    let mut stages = vec![JobStage::new("pull", "Pull Image")];

    ctx.log_stdout(&format!("=== Image Pull: {} ===", image));

    stages[0].start();
    ctx.update_stages(stages.clone()).await;
    ctx.log_stdout(&format!(">>> docker pull {}", image));

    let result = CommandRunner::run_with_streaming(
        &ctx.state.config.docker_bin,
        &["pull", &image],
        Path::new("."),
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        Duration::from_secs(JOB_TIMEOUT_SECS),
    )
    .await;

    let mut exit_code = 0;
    let status = match result {
        Ok(result) if result.status.success() => {
            stages[0].finish(true, None);
            ctx.log_stdout("=== Pull Complete ===");
            JobStatus::Success
        }
        Ok(result) => {
            exit_code = result.status.code().unwrap_or(-1);
            stages[0].finish(false, Some("docker pull failed".to_string()));
            ctx.log_stderr("Error: failed to pull image");
            JobStatus::Failed
        }
        Err(CommandError::Cancelled) => {
            exit_code = -2;
            stages[0].finish(false, Some("cancelled".to_string()));
            ctx.log_stderr("Job cancelled");
            JobStatus::Cancelled
        }
        Err(e) => {
            exit_code = -1;
            stages[0].finish(false, Some(e.to_string()));
            ctx.log_stderr(&format!("Error: failed to run docker pull: {}", e));
            JobStatus::Failed
        }
    };

    stage_summary(ctx, &stages);
    ctx.finish(status, Some(exit_code), stages).await;

    tracing::info!(
        job_id = %ctx.job_id,
        image = %image,
        exit_code = exit_code,
        "Image pull job finished"
    );
}
