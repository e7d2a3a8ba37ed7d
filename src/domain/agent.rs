//! Agent domain models
//!
//! An agent is a remote daemon managing containers on another host. The
//! service keeps one WebSocket link per configured agent and mirrors the
//! frames it sends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection snapshot for one agent, as reported by the registry
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub url: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub reconnects: u64,
}

/// A frame received from an agent
///
/// Payloads are passed through untouched; the engine on the agent side is
/// the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Periodic resource usage sample
    Stats { payload: serde_json::Value },
    /// A log line from a container the agent watches
    Log {
        container: String,
        line: String,
        #[serde(default)]
        stream: Option<String>,
    },
    /// Container lifecycle change
    Status {
        container: String,
        state: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_frames_round_trip_tag() {
        let frame = r#"{"type":"log","container":"web-1","line":"ready"}"#;
        let event: AgentEvent = serde_json::from_str(frame).unwrap();
        match event {
            AgentEvent::Log {
                container, line, ..
            } => {
                assert_eq!(container, "web-1");
                assert_eq!(line, "ready");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_type_is_an_error() {
        let frame = r#"{"type":"telemetry","payload":{}}"#;
        assert!(serde_json::from_str::<AgentEvent>(frame).is_err());
    }
}
