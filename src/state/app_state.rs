//! Application state

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::EnvConfig;
use crate::domain::job::JobKind;
use crate::infra::{Docker, WebhookClient};

use super::agent_registry::AgentRegistry;
use super::job_store::JobStore;
use super::log_hub::LogHub;

/// Global shutdown token, cancelled once on SIGTERM/Ctrl-C
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN.get_or_init(CancellationToken::new).clone()
}

pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

/// Compose file names probed inside a stack directory, in order
const COMPOSE_FILE_NAMES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// A job currently executing against a stack
pub struct RunningJob {
    pub job_id: String,
    pub cancel_token: CancellationToken,
}

/// A job waiting for the stack's current job to finish
pub struct QueuedJob {
    pub job_id: String,
    pub kind: JobKind,
    pub queued_at: DateTime<Utc>,
}

pub struct AppState {
    pub config: EnvConfig,
    pub started_at: DateTime<Utc>,

    pub docker: Docker,
    pub webhook: WebhookClient,
    pub job_store: JobStore,
    pub log_hub: LogHub,
    pub agents: AgentRegistry,

    /// At most one job runs per stack (stack name -> RunningJob)
    pub running_jobs: RwLock<HashMap<String, RunningJob>>,
    /// Jobs waiting behind a running one (stack name -> queue)
    pub job_queue: RwLock<HashMap<String, VecDeque<QueuedJob>>>,
}

impl AppState {
    pub fn new(config: EnvConfig) -> Self {
        tracing::info!(
            api_key_len = config.api_key.len(),
            port = config.port,
            stacks_dir = %config.stacks_dir,
            agent_count = config.agents.len(),
            webhook = config.webhook_url.is_some(),
            "Loaded configuration"
        );

        Self {
            docker: Docker::new(config.docker_bin.clone()),
            webhook: WebhookClient::new(config.webhook_url.clone()),
            job_store: JobStore::new(),
            log_hub: LogHub::new(),
            agents: AgentRegistry::new(config.agents.clone()),
            running_jobs: RwLock::new(HashMap::new()),
            job_queue: RwLock::new(HashMap::new()),
            started_at: Utc::now(),
            config,
        }
    }

    // ---- stacks on disk ----

    /// Stack directories under `stacks_dir` that contain a compose file
    pub async fn list_stacks(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.config.stacks_dir).await {
            Ok(entries) => entries,
            Err(_) => return names,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if compose_file_in(&path).is_some() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        names
    }

    pub fn stack_dir(&self, name: &str) -> PathBuf {
        PathBuf::from(&self.config.stacks_dir).join(name)
    }

    /// Full path to the stack's compose file, if the stack exists
    pub fn stack_compose_file(&self, name: &str) -> Option<PathBuf> {
        // Reject path traversal in stack names
        if name.contains('/') || name.contains("..") || name.is_empty() {
            return None;
        }
        compose_file_in(&self.stack_dir(name))
    }

    // ---- running jobs ----

    pub async fn has_running_job(&self, stack: &str) -> bool {
        let running = self.running_jobs.read().await;
        running.contains_key(stack)
    }

    /// Claim the stack's job slot, `None` when a job already holds it
    ///
    /// Check and insert happen under one write lock so concurrent
    /// requests cannot both claim the slot.
    pub async fn try_register_running_job(
        &self,
        stack: &str,
        job_id: &str,
    ) -> Option<CancellationToken> {
        let mut running = self.running_jobs.write().await;
        if running.contains_key(stack) {
            return None;
        }
        let cancel_token = CancellationToken::new();
        running.insert(
            stack.to_string(),
            RunningJob {
                job_id: job_id.to_string(),
                cancel_token: cancel_token.clone(),
            },
        );
        Some(cancel_token)
    }

    pub async fn unregister_running_job(&self, stack: &str) {
        let mut running = self.running_jobs.write().await;
        running.remove(stack);
    }

    pub async fn get_running_job_id(&self, stack: &str) -> Option<String> {
        let running = self.running_jobs.read().await;
        running.get(stack).map(|j| j.job_id.clone())
    }

    pub async fn cancel_job(&self, stack: &str) -> bool {
        let running = self.running_jobs.read().await;
        if let Some(job) = running.get(stack) {
            job.cancel_token.cancel();
            true
        } else {
            false
        }
    }

    // ---- per-stack queue ----

    /// Queue a job behind the running one, returns its 1-based position
    pub async fn enqueue_job(&self, stack: &str, queued: QueuedJob) -> usize {
        let mut queue = self.job_queue.write().await;
        let stack_queue = queue.entry(stack.to_string()).or_default();
        stack_queue.push_back(queued);
        stack_queue.len()
    }

    pub async fn dequeue_job(&self, stack: &str) -> Option<QueuedJob> {
        let mut queue = self.job_queue.write().await;
        queue.get_mut(stack).and_then(|q| q.pop_front())
    }

    /// Put a dequeued job back at the head of its queue
    pub async fn requeue_front(&self, stack: &str, queued: QueuedJob) {
        let mut queue = self.job_queue.write().await;
        queue.entry(stack.to_string()).or_default().push_front(queued);
    }

    pub async fn queue_length(&self, stack: &str) -> usize {
        let queue = self.job_queue.read().await;
        queue.get(stack).map_or(0, |q| q.len())
    }

    /// 1-based position in the queue, 0 when not queued
    pub async fn queue_position(&self, stack: &str, job_id: &str) -> usize {
        let queue = self.job_queue.read().await;
        if let Some(stack_queue) = queue.get(stack) {
            for (i, item) in stack_queue.iter().enumerate() {
                if item.job_id == job_id {
                    return i + 1;
                }
            }
        }
        0
    }

    /// Drop queued jobs older than `timeout_secs`, returning (stack, job_id) pairs
    pub async fn cleanup_expired_queue_items(&self, timeout_secs: u64) -> Vec<(String, String)> {
        let mut queue = self.job_queue.write().await;
        let now = Utc::now();
        let mut expired = Vec::new();

        for (stack, items) in queue.iter_mut() {
            let before_len = items.len();
            items.retain(|item| {
                let age = now - item.queued_at;
                if age.num_seconds() > timeout_secs as i64 {
                    expired.push((stack.clone(), item.job_id.clone()));
                    false
                } else {
                    true
                }
            });
            if items.len() != before_len {
                tracing::info!(
                    stack = %stack,
                    removed = before_len - items.len(),
                    "Cleaned up expired queue items"
                );
            }
        }

        expired
    }
}

fn compose_file_in(dir: &std::path::Path) -> Option<PathBuf> {
    COMPOSE_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;

    fn state_with_stacks_dir(dir: &str) -> AppState {
        let mut config = test_config();
        config.stacks_dir = dir.to_string();
        AppState::new(config)
    }

    fn test_config() -> EnvConfig {
        EnvConfig {
            api_key: "test-key".to_string(),
            port: 0,
            docker_bin: "docker".to_string(),
            stacks_dir: "./stacks".to_string(),
            agents: Vec::new(),
            webhook_url: None,
            backoff: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_running_job_registry() {
        let state = AppState::new(test_config());

        assert!(!state.has_running_job("blog").await);
        let token = state.try_register_running_job("blog", "job-1").await.unwrap();
        assert!(state.has_running_job("blog").await);
        assert_eq!(state.get_running_job_id("blog").await.as_deref(), Some("job-1"));

        assert!(state.cancel_job("blog").await);
        assert!(token.is_cancelled());

        state.unregister_running_job("blog").await;
        assert!(!state.cancel_job("blog").await);
    }

    #[tokio::test]
    async fn test_stack_slot_is_exclusive() {
        let state = std::sync::Arc::new(AppState::new(test_config()));

        // Two requests racing for the same stack: exactly one claims it
        let a = {
            let state = state.clone();
            tokio::spawn(async move { state.try_register_running_job("blog", "job-a").await })
        };
        let b = {
            let state = state.clone();
            tokio::spawn(async move { state.try_register_running_job("blog", "job-b").await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() != b.is_some(), "exactly one claim must win");

        let winner = if a.is_some() { "job-a" } else { "job-b" };
        assert_eq!(state.get_running_job_id("blog").await.as_deref(), Some(winner));

        // Slot stays claimed until released
        assert!(state.try_register_running_job("blog", "job-c").await.is_none());
        state.unregister_running_job("blog").await;
        assert!(state.try_register_running_job("blog", "job-c").await.is_some());
    }

    #[tokio::test]
    async fn test_queue_positions() {
        let state = AppState::new(test_config());

        let pos = state
            .enqueue_job(
                "blog",
                QueuedJob {
                    job_id: "j1".into(),
                    kind: JobKind::StackUp,
                    queued_at: Utc::now(),
                },
            )
            .await;
        assert_eq!(pos, 1);

        let pos = state
            .enqueue_job(
                "blog",
                QueuedJob {
                    job_id: "j2".into(),
                    kind: JobKind::StackDown,
                    queued_at: Utc::now(),
                },
            )
            .await;
        assert_eq!(pos, 2);

        assert_eq!(state.queue_position("blog", "j2").await, 2);
        assert_eq!(state.queue_position("blog", "nope").await, 0);

        let next = state.dequeue_job("blog").await.unwrap();
        assert_eq!(next.job_id, "j1");
        assert_eq!(state.queue_length("blog").await, 1);

        // A job put back keeps its place at the head
        state.requeue_front("blog", next).await;
        assert_eq!(state.queue_position("blog", "j1").await, 1);
        assert_eq!(state.queue_position("blog", "j2").await, 2);
    }

    #[tokio::test]
    async fn test_expired_queue_items_are_dropped() {
        let state = AppState::new(test_config());
        state
            .enqueue_job(
                "blog",
                QueuedJob {
                    job_id: "old".into(),
                    kind: JobKind::StackUp,
                    queued_at: Utc::now() - chrono::Duration::seconds(700),
                },
            )
            .await;
        state
            .enqueue_job(
                "blog",
                QueuedJob {
                    job_id: "fresh".into(),
                    kind: JobKind::StackUp,
                    queued_at: Utc::now(),
                },
            )
            .await;

        let expired = state.cleanup_expired_queue_items(600).await;
        assert_eq!(expired, vec![("blog".to_string(), "old".to_string())]);
        assert_eq!(state.queue_length("blog").await, 1);
    }

    #[tokio::test]
    async fn test_stack_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let blog = dir.path().join("blog");
        std::fs::create_dir(&blog).unwrap();
        std::fs::write(blog.join("docker-compose.yml"), "services: {}\n").unwrap();
        // Directory without a compose file is not a stack
        std::fs::create_dir(dir.path().join("scratch")).unwrap();

        let state = state_with_stacks_dir(dir.path().to_str().unwrap());
        assert_eq!(state.list_stacks().await, vec!["blog".to_string()]);
        assert!(state.stack_compose_file("blog").is_some());
        assert!(state.stack_compose_file("scratch").is_none());
        assert!(state.stack_compose_file("../etc").is_none());
    }
}
