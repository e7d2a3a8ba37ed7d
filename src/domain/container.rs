//! Container domain models

use serde::{Deserialize, Serialize};

/// One row of `docker ps`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: String,
    pub created: String,
    pub ports: Vec<String>,
}

/// Container list response
#[derive(Debug, Serialize)]
pub struct ContainersResponse {
    pub containers: Vec<ContainerSummary>,
}

/// Query parameters for container logs
#[derive(Debug, Deserialize)]
pub struct ContainerLogsQuery {
    /// Last N lines, default 100
    #[serde(default = "default_log_lines")]
    pub tail: usize,
    #[serde(default)]
    pub timestamps: bool,
    /// Only logs since this time (duration or RFC3339)
    pub since: Option<String>,
}

fn default_log_lines() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct ContainerLogsResponse {
    pub container: String,
    pub logs: Vec<String>,
    pub total_lines: usize,
}

/// An environment variable from `docker inspect`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    /// True when the name looks like a credential
    #[serde(default)]
    pub sensitive: bool,
}

impl EnvVar {
    pub fn new(key: String, value: String, sensitive: bool) -> Self {
        Self {
            key,
            value,
            sensitive,
        }
    }

    const SENSITIVE_KEYWORDS: &'static [&'static str] = &[
        "password",
        "secret",
        "key",
        "token",
        "credential",
        "auth",
        "private",
        "jwt",
        "cert",
    ];

    pub fn is_sensitive_key(key: &str) -> bool {
        let key_lower = key.to_lowercase();
        Self::SENSITIVE_KEYWORDS
            .iter()
            .any(|kw| key_lower.contains(kw))
    }
}

#[derive(Debug, Serialize)]
pub struct ContainerEnvResponse {
    pub container: String,
    pub env_vars: Vec<EnvVar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_sensitive_key() {
        assert!(EnvVar::is_sensitive_key("POSTGRES_PASSWORD"));
        assert!(EnvVar::is_sensitive_key("api_key"));
        assert!(EnvVar::is_sensitive_key("SESSION_TOKEN"));
        assert!(!EnvVar::is_sensitive_key("DEBUG"));
        assert!(!EnvVar::is_sensitive_key("PORT"));
    }
}
