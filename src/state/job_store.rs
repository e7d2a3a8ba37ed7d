//! Job storage
//!
//! Tracks active jobs in memory and keeps a bounded history of finished
//! ones. Stale entries are dropped by the periodic cleaner.

use chrono::{Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

use crate::config::env::constants::{MAX_ACTIVE_JOBS, MAX_JOB_HISTORY};
use crate::domain::job::{Job, JobStage, JobStatus};

pub struct JobStore {
    active: RwLock<HashMap<String, Job>>,
    history: RwLock<VecDeque<Job>>,
    max_active: usize,
    max_history: usize,
    /// Finished jobs older than this are discarded
    retention: Duration,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            max_active: MAX_ACTIVE_JOBS,
            max_history: MAX_JOB_HISTORY,
            retention: Duration::hours(24),
        }
    }

    pub fn with_config(max_active: usize, max_history: usize, retention_hours: i64) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            max_active,
            max_history,
            retention: Duration::hours(retention_hours),
        }
    }

    pub async fn create(&self, job: Job) -> String {
        let job_id = job.id.clone();
        let mut active = self.active.write().await;
        active.insert(job_id.clone(), job);
        job_id
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        let active = self.active.read().await;
        active.get(job_id).cloned()
    }

    /// Look up a job in the active set first, then the history
    pub async fn get_any(&self, job_id: &str) -> Option<Job> {
        if let Some(job) = self.get(job_id).await {
            return Some(job);
        }
        let history = self.history.read().await;
        history.iter().find(|j| j.id == job_id).cloned()
    }

    pub async fn get_all(&self) -> Vec<Job> {
        let active = self.active.read().await;
        active.values().cloned().collect()
    }

    pub async fn exists(&self, job_id: &str) -> bool {
        let active = self.active.read().await;
        active.contains_key(job_id)
    }

    pub async fn update_status(&self, job_id: &str, status: JobStatus, exit_code: Option<i32>) {
        let mut active = self.active.write().await;
        if let Some(job) = active.get_mut(job_id) {
            job.status = status;
            job.exit_code = exit_code;
            if job.status.is_terminal() {
                job.finished_at = Some(Utc::now());
            }
        }
    }

    pub async fn update_stages(&self, job_id: &str, stages: Vec<JobStage>) {
        let mut active = self.active.write().await;
        if let Some(job) = active.get_mut(job_id) {
            job.stages = stages;
        }
    }

    /// Complete a job and move it from the active set into history
    pub async fn finish(&self, job_id: &str, status: JobStatus, exit_code: Option<i32>) {
        let job = {
            let mut active = self.active.write().await;
            active.remove(job_id).map(|mut job| {
                job.status = status;
                job.exit_code = exit_code;
                job.finished_at = Some(Utc::now());
                job
            })
        };

        if let Some(job) = job {
            self.add_to_history(job).await;
        }
    }

    pub async fn add_to_history(&self, job: Job) {
        let mut history = self.history.write().await;
        history.push_front(job);
        while history.len() > self.max_history {
            history.pop_back();
        }
    }

    /// Recent finished jobs, newest first, optionally filtered
    pub async fn get_history(
        &self,
        limit: usize,
        target: Option<&str>,
        status: Option<&str>,
    ) -> Vec<Job> {
        let history = self.history.read().await;
        history
            .iter()
            .filter(|job| {
                let target_match = target.map_or(true, |t| job.target == t);
                let status_match = status.map_or(true, |s| job.status.as_str() == s);
                target_match && status_match
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn history_count(&self) -> usize {
        let history = self.history.read().await;
        history.len()
    }

    /// Drop finished jobs older than the retention window
    pub async fn cleanup_stale(&self) {
        let cutoff = Utc::now() - self.retention;

        {
            let mut active = self.active.write().await;
            active.retain(|_, job| {
                !job.status.is_terminal() || job.finished_at.map_or(true, |t| t > cutoff)
            });
        }

        {
            let mut history = self.history.write().await;
            history.retain(|job| job.finished_at.map_or(true, |t| t > cutoff));
        }
    }

    pub async fn active_count(&self) -> usize {
        let active = self.active.read().await;
        active.len()
    }

    pub async fn is_at_capacity(&self) -> bool {
        self.active_count().await >= self.max_active
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobKind;

    #[tokio::test]
    async fn test_job_lifecycle() {
        let store = JobStore::new();

        let job = Job::new("job-1".to_string(), JobKind::StackUp, "blog".to_string());
        store.create(job).await;

        let job = store.get("job-1").await;
        assert!(job.is_some());
        assert_eq!(job.unwrap().target, "blog");

        store.finish("job-1", JobStatus::Success, Some(0)).await;

        assert!(store.get("job-1").await.is_none());

        let history = store.get_history(10, None, None).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "job-1");
        assert!(history[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_history_limit() {
        let store = JobStore::with_config(10, 5, 24);

        for i in 0..10 {
            let mut job = Job::new(format!("job-{}", i), JobKind::ImagePull, "nginx".to_string());
            job.status = JobStatus::Success;
            job.finished_at = Some(Utc::now());
            store.add_to_history(job).await;
        }

        assert_eq!(store.history_count().await, 5);
    }

    #[tokio::test]
    async fn test_history_filters() {
        let store = JobStore::new();
        for (id, target, status) in [
            ("a", "blog", JobStatus::Success),
            ("b", "blog", JobStatus::Failed),
            ("c", "wiki", JobStatus::Success),
        ] {
            let mut job = Job::new(id.to_string(), JobKind::StackUp, target.to_string());
            job.complete(status, None);
            store.add_to_history(job).await;
        }

        assert_eq!(store.get_history(10, Some("blog"), None).await.len(), 2);
        assert_eq!(store.get_history(10, None, Some("failed")).await.len(), 1);
        assert_eq!(
            store.get_history(10, Some("wiki"), Some("success")).await.len(),
            1
        );
    }
}
