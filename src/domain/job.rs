//! Job domain models
//!
//! Long-running operations (stack up/down, image pulls) run as background
//! jobs with staged progress and a streamed log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a job does
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    StackUp,
    StackDown,
    ImagePull,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::StackUp => "stack_up",
            JobKind::StackDown => "stack_down",
            JobKind::ImagePull => "image_pull",
        }
    }
}

/// Job lifecycle state
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// One step of a job, e.g. "validate", "pull", "up"
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobStage {
    pub name: String,
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
    pub message: Option<String>,
}

impl JobStage {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }
}

/// A background job
#[derive(Clone, Debug, Serialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    /// Stack name or image reference, depending on the kind
    pub target: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub stages: Vec<JobStage>,
}

impl Job {
    pub fn new(id: String, kind: JobKind, target: String) -> Self {
        Self {
            id,
            kind,
            target,
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            exit_code: None,
            stages: Vec::new(),
        }
    }

    pub fn new_queued(id: String, kind: JobKind, target: String) -> Self {
        Self {
            status: JobStatus::Queued,
            ..Self::new(id, kind, target)
        }
    }

    pub fn complete(&mut self, status: JobStatus, exit_code: Option<i32>) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.exit_code = exit_code;
    }
}

/// A single streamed log line
#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: String, // stdout | stderr
    pub content: String,
}

impl LogLine {
    pub fn new(stream: &str, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream: stream.to_string(),
            content: content.into(),
        }
    }

    pub fn stdout(content: impl Into<String>) -> Self {
        Self::new("stdout", content)
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self::new("stderr", content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_stage_lifecycle() {
        let mut stage = JobStage::new("pull", "Pull Images");
        assert_eq!(stage.status, StageStatus::Pending);

        stage.start();
        assert_eq!(stage.status, StageStatus::Running);
        assert!(stage.started_at.is_some());

        stage.finish(true, None);
        assert_eq!(stage.status, StageStatus::Success);
        assert!(stage.duration_ms.is_some());
    }

    #[test]
    fn test_queued_job_starts_queued() {
        let job = Job::new_queued("j1".into(), JobKind::StackUp, "blog".into());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.kind.as_str(), "stack_up");
    }
}
