//! Environment variable configuration loading

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::transport::BackoffPolicy;

/// Service configuration
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// API key required on mutating endpoints
    pub api_key: String,
    /// HTTP listen port
    pub port: u16,
    /// Docker CLI binary
    pub docker_bin: String,
    /// Directory holding one subdirectory per compose stack
    pub stacks_dir: String,
    /// Remote agents to keep a WebSocket link to
    pub agents: Vec<AgentConfig>,
    /// URL notified when a job finishes
    pub webhook_url: Option<String>,
    /// Reconnect policy for agent links
    pub backoff: BackoffPolicy,
}

/// One configured remote agent
#[derive(Clone, Debug, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    /// WebSocket endpoint, e.g. `ws://host:9850/events`
    pub url: String,
    pub token: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // API key, old name kept for compatibility
        let api_key = load_with_fallback("DOCKHAND_API_KEY", "API_KEY")
            .unwrap_or_else(|| "change-me-in-production".to_string());
        if env::var("API_KEY").is_ok() {
            warn!("Deprecated API_KEY variable detected. Please use DOCKHAND_API_KEY");
        }

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9850);

        let docker_bin = env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".to_string());

        let stacks_dir =
            env::var("DOCKHAND_STACKS_DIR").unwrap_or_else(|_| "./stacks".to_string());

        let agents = env::var("DOCKHAND_AGENTS")
            .map(|v| AgentConfig::parse_list(&v))
            .unwrap_or_default();

        let webhook_url = env::var("DOCKHAND_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let backoff = BackoffPolicy {
            initial: duration_from_env("DOCKHAND_RECONNECT_INITIAL_MS", 1000),
            max: duration_from_env("DOCKHAND_RECONNECT_MAX_MS", 60_000),
            multiplier: 2.0,
            jitter: 0.2,
        };

        Self {
            api_key,
            port,
            docker_bin,
            stacks_dir,
            agents,
            webhook_url,
            backoff,
        }
    }
}

impl AgentConfig {
    /// Parse `name=url[|token],name=url[|token],...`
    pub fn parse_list(input: &str) -> Vec<AgentConfig> {
        input
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                if entry.is_empty() {
                    return None;
                }
                let (name, rest) = match entry.split_once('=') {
                    Some(parts) => parts,
                    None => {
                        warn!(entry = %entry, "Ignoring malformed agent entry");
                        return None;
                    }
                };
                let (url, token) = match rest.split_once('|') {
                    Some((url, token)) => (url, Some(token.to_string())),
                    None => (rest, None),
                };
                if !url.starts_with("ws://") && !url.starts_with("wss://") {
                    warn!(entry = %entry, "Ignoring agent entry with non-WebSocket URL");
                    return None;
                }
                Some(AgentConfig {
                    name: name.trim().to_string(),
                    url: url.trim().to_string(),
                    token,
                })
            })
            .collect()
    }
}

fn load_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

fn duration_from_env(name: &str, default_ms: u64) -> Duration {
    let ms = env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

/// Service-wide constants
pub mod constants {
    /// Job timeout (seconds)
    pub const JOB_TIMEOUT_SECS: u64 = 1800; // 30 minutes

    /// Maximum kept job history entries
    pub const MAX_JOB_HISTORY: usize = 100;

    /// Maximum concurrently tracked active jobs
    pub const MAX_ACTIVE_JOBS: usize = 50;

    /// Maximum queued jobs per stack
    pub const MAX_QUEUE_SIZE: usize = 10;

    /// Queued jobs older than this are dropped (seconds)
    pub const QUEUE_TIMEOUT_SECS: u64 = 600; // 10 minutes

    /// Background cleanup cadence (seconds)
    pub const CLEANUP_INTERVAL_SECS: u64 = 300;

    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_agent_list() {
        let agents = AgentConfig::parse_list(
            "edge1=ws://10.0.0.2:9850/events|secret,edge2=wss://edge2.local/events",
        );
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].name, "edge1");
        assert_eq!(agents[0].url, "ws://10.0.0.2:9850/events");
        assert_eq!(agents[0].token.as_deref(), Some("secret"));
        assert_eq!(agents[1].name, "edge2");
        assert_eq!(agents[1].token, None);
    }

    #[test]
    fn test_parse_agent_list_skips_malformed() {
        let agents = AgentConfig::parse_list("bad-entry,ok=ws://h/e,also=http://not-ws");
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "ok");
    }

    #[test]
    fn test_parse_agent_list_empty() {
        assert!(AgentConfig::parse_list("").is_empty());
        assert!(AgentConfig::parse_list(" , ,").is_empty());
    }

    #[test]
    fn test_load_with_fallback() {
        env::set_var("TEST_PRIMARY_VAR", "primary");
        env::set_var("TEST_FALLBACK_VAR", "fallback");

        assert_eq!(
            load_with_fallback("TEST_PRIMARY_VAR", "TEST_FALLBACK_VAR"),
            Some("primary".to_string())
        );

        env::remove_var("TEST_PRIMARY_VAR");
        assert_eq!(
            load_with_fallback("TEST_PRIMARY_VAR", "TEST_FALLBACK_VAR"),
            Some("fallback".to_string())
        );

        env::remove_var("TEST_FALLBACK_VAR");
        assert_eq!(
            load_with_fallback("TEST_PRIMARY_VAR", "TEST_FALLBACK_VAR"),
            None
        );
    }
}
