//! Webhook notifications
//!
//! When `DOCKHAND_WEBHOOK_URL` is set, finished jobs are reported there
//! with a POST. Delivery is retried a few times; failures are logged and
//! otherwise ignored.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::domain::job::Job;
use crate::error::extract_error_message;

const NOTIFY_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    url: Option<String>,
}

#[derive(Serialize)]
struct JobNotification<'a> {
    event: &'static str,
    job: &'a Job,
}

impl WebhookClient {
    pub fn new(url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, url }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Report a finished job, best effort
    pub async fn notify_job_finished(&self, job: &Job) {
        let Some(ref url) = self.url else {
            return;
        };

        let body = JobNotification {
            event: "job_finished",
            job,
        };

        for attempt in 1..=NOTIFY_ATTEMPTS {
            match self
                .client
                .post(url)
                .timeout(Duration::from_secs(10))
                .json(&body)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        job_id = %job.id,
                        status = %job.status.as_str(),
                        attempt = attempt,
                        "Webhook delivered"
                    );
                    return;
                }
                Ok(resp) => {
                    let status = resp.status();
                    // Pull whatever error message the receiver shaped its
                    // body into, the formats vary
                    let message = resp
                        .json::<serde_json::Value>()
                        .await
                        .ok()
                        .as_ref()
                        .and_then(extract_error_message);
                    warn!(
                        job_id = %job.id,
                        status = %status,
                        message = ?message,
                        attempt = attempt,
                        "Webhook endpoint returned non-success status"
                    );
                }
                Err(e) => {
                    warn!(
                        job_id = %job.id,
                        error = %e,
                        attempt = attempt,
                        "Failed to deliver webhook, will retry"
                    );
                }
            }

            if attempt < NOTIFY_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }

        error!(job_id = %job.id, "Webhook delivery failed after {} attempts", NOTIFY_ATTEMPTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{JobKind, JobStatus};

    #[test]
    fn test_client_without_url() {
        let client = WebhookClient::new(None);
        assert!(!client.is_configured());
    }

    #[test]
    fn test_client_with_url() {
        let client = WebhookClient::new(Some("https://example.com/hooks/jobs".to_string()));
        assert!(client.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_notify_is_a_noop() {
        let client = WebhookClient::new(None);
        let mut job = Job::new("j1".into(), JobKind::StackUp, "blog".into());
        job.complete(JobStatus::Success, Some(0));
        // returns immediately without any network activity
        client.notify_job_finished(&job).await;
    }
}
