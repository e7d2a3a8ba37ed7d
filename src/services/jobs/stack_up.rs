//! Stack up job
//!
//! Validates the stack's compose file, pulls images and brings the stack
//! up with `compose up -d`. Each step is a tracked stage.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::compose;
use crate::config::env::constants::JOB_TIMEOUT_SECS;
use crate::domain::job::{JobStage, JobStatus};
use crate::infra::{CommandError, CommandRunner};

use super::context::JobContext;
use super::stage_summary;

pub async fn execute(ctx: &JobContext) {
    let stack = ctx.target.clone();
    let mut stages = vec![
        JobStage::new("validate", "Validate Compose File"),
        JobStage::new("pull", "Pull Images"),
        JobStage::new("up", "Compose Up"),
    ];

    ctx.log_stdout(&format!("=== Stack Up: {} ===", stack));
    ctx.log_stdout(&format!("Timestamp: {}", chrono::Utc::now().to_rfc3339()));

    let Some(compose_path) = ctx.state.stack_compose_file(&stack) else {
        ctx.log_stderr(&format!("No compose file found for stack '{}'", stack));
        stages[0].finish(false, Some("compose file not found".to_string()));
        ctx.finish(JobStatus::Failed, Some(-1), stages).await;
        return;
    };
    let compose_path_str = compose_path.display().to_string();
    let work_dir = ctx.state.stack_dir(&stack);

    // Stage 1: validate
    stages[0].start();
    ctx.update_stages(stages.clone()).await;
    ctx.log_stdout(&format!("[1/3] Validating {}...", compose_path_str));

    let content = match tokio::fs::read_to_string(&compose_path).await {
        Ok(content) => content,
        Err(e) => {
            ctx.log_stderr(&format!("Error: failed to read compose file: {}", e));
            stages[0].finish(false, Some(e.to_string()));
            ctx.finish(JobStatus::Failed, Some(-1), stages).await;
            return;
        }
    };

    let vars: BTreeMap<String, String> = std::env::vars().collect();
    match compose::load(&content, &vars) {
        Ok(normalized) => {
            ctx.log_stdout(&format!(
                "Validated {} service(s), start order: {}",
                normalized.services.len(),
                normalized.deploy_order.join(", ")
            ));
            stages[0].finish(true, None);
        }
        Err(e) => {
            ctx.log_stderr(&format!("Error: invalid compose file: {}", e));
            stages[0].finish(false, Some(e.to_string()));
            ctx.finish(JobStatus::Failed, Some(-1), stages).await;
            return;
        }
    }
    ctx.update_stages(stages.clone()).await;

    if ctx.is_cancelled() {
        ctx.log_stderr("Job cancelled");
        ctx.finish(JobStatus::Cancelled, Some(-2), stages).await;
        return;
    }

    let (compose_cmd, base_args) = ctx.state.docker.detect_compose_command().await;
    ctx.log_stdout(&format!("Using: {} {}", compose_cmd, base_args.join(" ")));

    let timeout = Duration::from_secs(JOB_TIMEOUT_SECS);
    let mut exit_code = 0;

    // Stage 2: pull, failures are warnings since up may still succeed
    // with locally cached images
    stages[1].start();
    ctx.update_stages(stages.clone()).await;
    ctx.log_stdout("[2/3] Pulling images...");

    let mut args: Vec<&str> = base_args.iter().map(String::as_str).collect();
    args.extend(["-p", &stack, "-f", &compose_path_str, "pull"]);
    ctx.log_stdout(&format!(">>> {} {}", compose_cmd, args.join(" ")));

    let pull_result = CommandRunner::run_with_streaming(
        &compose_cmd,
        &args,
        &work_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await;

    match pull_result {
        Ok(result) if result.status.success() => {
            stages[1].finish(true, None);
        }
        Ok(_) => {
            stages[1].finish(false, Some("pull had issues".to_string()));
            ctx.log_stderr("Warning: pull had issues, continuing...");
        }
        Err(CommandError::Cancelled) => {
            stages[1].finish(false, Some("cancelled".to_string()));
            ctx.log_stderr("Job cancelled");
            ctx.finish(JobStatus::Cancelled, Some(-2), stages).await;
            return;
        }
        Err(e) => {
            stages[1].finish(false, Some(e.to_string()));
            ctx.log_stderr(&format!("Warning: failed to run pull: {}", e));
        }
    }
    ctx.update_stages(stages.clone()).await;

    // Stage 3: up
    stages[2].start();
    ctx.update_stages(stages.clone()).await;
    ctx.log_stdout("[3/3] Starting services...");

    let mut args: Vec<&str> = base_args.iter().map(String::as_str).collect();
    args.extend([
        "-p",
        &stack,
        "-f",
        &compose_path_str,
        "up",
        "-d",
        "--remove-orphans",
    ]);
    ctx.log_stdout(&format!(">>> {} {}", compose_cmd, args.join(" ")));

    let up_result = CommandRunner::run_with_streaming(
        &compose_cmd,
        &args,
        &work_dir,
        ctx.log_tx.clone(),
        ctx.cancel_token.clone(),
        timeout,
    )
    .await;

    let status = match up_result {
        Ok(result) if result.status.success() => {
            stages[2].finish(true, None);
            ctx.log_stdout("");
            ctx.log_stdout("=== Stack Up Complete ===");
            JobStatus::Success
        }
        Ok(result) => {
            exit_code = result.status.code().unwrap_or(-1);
            stages[2].finish(false, Some("compose up failed".to_string()));
            ctx.log_stderr("Error: failed to start services");
            JobStatus::Failed
        }
        Err(CommandError::Cancelled) => {
            exit_code = -2;
            stages[2].finish(false, Some("cancelled".to_string()));
            ctx.log_stderr("Job cancelled");
            JobStatus::Cancelled
        }
        Err(e) => {
            exit_code = -1;
            stages[2].finish(false, Some(e.to_string()));
            ctx.log_stderr(&format!("Error: failed to run compose up: {}", e));
            JobStatus::Failed
        }
    };
    ctx.update_stages(stages.clone()).await;

    stage_summary(ctx, &stages);
    ctx.finish(status, Some(exit_code), stages).await;

    tracing::info!(
        job_id = %ctx.job_id,
        stack = %stack,
        exit_code = exit_code,
        "Stack up job finished"
    );
}
