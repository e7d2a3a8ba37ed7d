//! Command execution
//!
//! Unified interface for running external commands with streamed output,
//! timeout control and cancellation. stdout and stderr are read line by
//! line and broadcast as `LogLine`s.

use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::domain::job::LogLine;

pub struct CommandRunner;

#[derive(Debug)]
pub enum CommandError {
    SpawnFailed(std::io::Error),
    Timeout,
    Cancelled,
    WaitFailed(std::io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::SpawnFailed(e) => write!(f, "Failed to spawn command: {}", e),
            CommandError::Timeout => write!(f, "Command timed out"),
            CommandError::Cancelled => write!(f, "Command was cancelled"),
            CommandError::WaitFailed(e) => write!(f, "Failed to wait for command: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::SpawnFailed(e) | CommandError::WaitFailed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub timed_out: bool,
}

impl CommandRunner {
    /// Run a command, streaming its output to `log_tx`
    pub async fn run_with_streaming(
        program: &str,
        args: &[&str],
        work_dir: &Path,
        log_tx: broadcast::Sender<LogLine>,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(work_dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CommandError::SpawnFailed)?;

        // line readers for both pipes
        let stdout_task = child.stdout.take().map(|out| {
            let tx = log_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(out).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = tx.send(LogLine::stdout(line));
                }
            })
        });
        let stderr_task = child.stderr.take().map(|err| {
            let tx = log_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = tx.send(LogLine::stderr(line));
                }
            })
        });

        let result = tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) => Ok(CommandResult { status, timed_out: false }),
                    Err(e) => Err(CommandError::WaitFailed(e)),
                }
            }
            _ = cancel.cancelled() => {
                warn!(program = %program, "Killing cancelled command");
                if let Err(e) = child.kill().await {
                    error!(error = %e, "Failed to kill cancelled command");
                }
                Err(CommandError::Cancelled)
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(program = %program, timeout_secs = timeout.as_secs(), "Killing timed-out command");
                if let Err(e) = child.kill().await {
                    error!(error = %e, "Failed to kill timed-out command");
                }
                Err(CommandError::Timeout)
            }
        };

        // let the readers drain whatever is left in the pipes
        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cwd() -> PathBuf {
        std::env::current_dir().unwrap()
    }

    #[tokio::test]
    async fn test_streams_stdout_lines() {
        let (tx, mut rx) = broadcast::channel(64);
        let result = CommandRunner::run_with_streaming(
            "sh",
            &["-c", "echo one; echo two"],
            &cwd(),
            tx,
            CancellationToken::new(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert!(result.status.success());
        assert!(!result.timed_out);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "one");
        assert_eq!(first.stream, "stdout");
        assert_eq!(rx.recv().await.unwrap().content, "two");
    }

    #[tokio::test]
    async fn test_stderr_is_tagged() {
        let (tx, mut rx) = broadcast::channel(64);
        CommandRunner::run_with_streaming(
            "sh",
            &["-c", "echo oops >&2"],
            &cwd(),
            tx,
            CancellationToken::new(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        let line = rx.recv().await.unwrap();
        assert_eq!(line.stream, "stderr");
        assert_eq!(line.content, "oops");
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let (tx, _rx) = broadcast::channel(16);
        let err = CommandRunner::run_with_streaming(
            "sleep",
            &["30"],
            &cwd(),
            tx,
            CancellationToken::new(),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommandError::Timeout));
    }

    #[tokio::test]
    async fn test_cancellation_kills_command() {
        let (tx, _rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let err = CommandRunner::run_with_streaming(
            "sleep",
            &["30"],
            &cwd(),
            tx,
            cancel,
            Duration::from_secs(30),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommandError::Cancelled));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let (tx, _rx) = broadcast::channel(16);
        let err = CommandRunner::run_with_streaming(
            "definitely-not-a-real-binary",
            &[],
            &cwd(),
            tx,
            CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommandError::SpawnFailed(_)));
    }
}
