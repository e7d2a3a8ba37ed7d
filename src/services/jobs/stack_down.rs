//! Stack down job

use std::time::Duration;

use crate::config::env::constants::JOB_TIMEOUT_SECS;
use crate::domain::job::{JobStage, JobStatus};
use crate::infra::{CommandError, CommandRunner};

use super::context::JobContext;
use super::stage_summary;

pub async fn execute(ctx: &JobContext) {
    let stack = ctx.target.clone();
    let mut stages = vec![JobStage::new("down", "Compose Down")];

    ctx.log_stdout(&format!("=== Stack Down: {} ===", stack));

    let Some(compose_path) = ctx.state.stack_compose_file(&stack) else {
        ctx.log_stderr(&format!("No compose file found for stack '{}'", stack));
        stages[0].finish(false, Some("compose file not found".to_string()));
        ctx.finish(JobStatus::Failed, Some(-1), stages).await;
        return;
    };
    let compose_path_str = compose_path.display().to_string();
    let work_dir = ctx.state.stack_dir(&stack);

    stages[0].start();
    ctx.update_stages(stages.clone()).await;

    let (compose_cmd, base_args) = ctx.state.docker.detect_compose_command().await;
    let mut args: Vec<&str> = base_args.iter().map(String::as_str).collect();
    args.extend([
        "-p",
        &stack,
        "-f",
        &compose_path_str,
        "down",
        "--remove-orphans",
    ]);
    ctx.log_stdout(&format!(">>> {} {}", compose_cmd, args.join(" ")));

    let result = CommandRunner::run_with_streaming(
        &compose_cmd,
        &args,
        &work_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        Duration::from_secs(JOB_TIMEOUT_SECS),
    )
    .await;

    let mut exit_code = 0;
    let status = match result {
        Ok(result) if result.status.success() => {
            stages[0].finish(true, None);
            ctx.log_stdout("=== Stack Down Complete ===");
            JobStatus::Success
        }
        Ok(result) => {
            exit_code = result.status.code().unwrap_or(-1);
            stages[0].finish(false, Some("compose down failed".to_string()));
            ctx.log_stderr("Error: failed to stop services");
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
            ctx.log_stderr(&format!("Error: failed to run compose down: {}", e));
            JobStatus::Failed
        }
    };

    stage_summary(ctx, &stages);
    ctx.finish(status, Some(exit_code), stages).await;

    tracing::info!(
        job_id = %ctx.job_id,
        stack = %stack,
        exit_code = exit_code,
        "Stack down job finished"
    );
}
