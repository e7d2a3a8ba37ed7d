//! Per-job log channels
//!
//! Each job gets a broadcast channel that the runner writes into and SSE
//! subscribers read from. Channels are marked finished when the job ends
//! and reaped once nobody is listening.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::domain::job::LogLine;

const LOG_CHANNEL_CAPACITY: usize = 256;

struct LogChannel {
    sender: broadcast::Sender<LogLine>,
    created_at: DateTime<Utc>,
    finished: bool,
}

pub struct LogHub {
    channels: RwLock<HashMap<String, LogChannel>>,
}

impl LogHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Create the channel for a job, or return the existing sender
    pub async fn create(&self, job_id: &str) -> broadcast::Sender<LogLine> {
        let mut channels = self.channels.write().await;

        if let Some(channel) = channels.get(job_id) {
            return channel.sender.clone();
        }

        let (sender, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        channels.insert(
            job_id.to_string(),
            LogChannel {
                sender: sender.clone(),
                created_at: Utc::now(),
                finished: false,
            },
        );

        sender
    }

    pub async fn subscribe(&self, job_id: &str) -> Option<broadcast::Receiver<LogLine>> {
        let channels = self.channels.read().await;
        channels.get(job_id).map(|c| c.sender.subscribe())
    }

    pub async fn get_sender(&self, job_id: &str) -> Option<broadcast::Sender<LogLine>> {
        let channels = self.channels.read().await;
        channels.get(job_id).map(|c| c.sender.clone())
    }

    /// Mark a channel finished so SSE subscribers close out
    pub async fn finish(&self, job_id: &str) {
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.get_mut(job_id) {
            channel.finished = true;
        }
    }

    pub async fn is_finished(&self, job_id: &str) -> bool {
        let channels = self.channels.read().await;
        channels.get(job_id).map_or(true, |c| c.finished)
    }

    pub async fn exists(&self, job_id: &str) -> bool {
        let channels = self.channels.read().await;
        channels.contains_key(job_id)
    }

    /// Remove finished channels with no remaining subscribers
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, channel| {
            if !channel.finished {
                return true;
            }
            channel.sender.receiver_count() > 0
        });
    }

    /// Remove finished channels older than `max_age_hours`
    pub async fn cleanup_expired(&self, max_age_hours: i64) {
        let now = Utc::now();
        let mut channels = self.channels.write().await;

        channels.retain(|_, channel| {
            let age = now - channel.created_at;
            if age.num_hours() < max_age_hours {
                return true;
            }
            !channel.finished || channel.sender.receiver_count() > 0
        });
    }

    pub async fn count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.len()
    }

    pub async fn active_count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.values().filter(|c| !c.finished).count()
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_subscribe() {
        let hub = LogHub::new();

        let sender = hub.create("job-1").await;
        assert!(hub.exists("job-1").await);

        let mut receiver = hub.subscribe("job-1").await.unwrap();

        let _ = sender.send(LogLine::stdout("Pulling db (postgres:16)..."));

        let line = receiver.recv().await.unwrap();
        assert_eq!(line.content, "Pulling db (postgres:16)...");
        assert_eq!(line.stream, "stdout");
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let hub = LogHub::new();
        let first = hub.create("job-1").await;
        let mut receiver = first.subscribe();

        // Second create must hand back the same channel
        let second = hub.create("job-1").await;
        let _ = second.send(LogLine::stderr("warn"));
        assert_eq!(receiver.recv().await.unwrap().stream, "stderr");
        assert_eq!(hub.count().await, 1);
    }

    #[tokio::test]
    async fn test_finish_and_cleanup() {
        let hub = LogHub::new();

        hub.create("job-1").await;
        assert!(!hub.is_finished("job-1").await);

        hub.finish("job-1").await;
        assert!(hub.is_finished("job-1").await);

        hub.cleanup().await;
        assert!(!hub.exists("job-1").await);
    }

    #[tokio::test]
    async fn test_cleanup_preserves_active_subscribers() {
        let hub = LogHub::new();

        hub.create("job-1").await;
        let _receiver = hub.subscribe("job-1").await;

        hub.finish("job-1").await;
        hub.cleanup().await;

        assert!(hub.exists("job-1").await);
    }

    #[tokio::test]
    async fn test_missing_channel_reports_finished() {
        let hub = LogHub::new();
        assert!(hub.is_finished("no-such-job").await);
        assert!(hub.subscribe("no-such-job").await.is_none());
    }
}
