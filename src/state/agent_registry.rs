//! Agent link runtime state
//!
//! Connection status and event fan-out for every configured remote
//! agent. The link tasks in `services::agent_link` write both; the REST
//! surface reads the snapshots and subscribes to the event channels.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::config::AgentConfig;
use crate::domain::agent::{AgentEvent, AgentInfo};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Mutable link state for one agent
#[derive(Default)]
struct LinkState {
    connected: bool,
    connected_at: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    last_error: Option<String>,
    reconnects: u64,
}

pub struct AgentRegistry {
    configs: Vec<AgentConfig>,
    links: RwLock<HashMap<String, LinkState>>,
    /// One broadcast channel per agent; fixed at construction
    events: HashMap<String, broadcast::Sender<AgentEvent>>,
}

impl AgentRegistry {
    pub fn new(configs: Vec<AgentConfig>) -> Self {
        let links = configs
            .iter()
            .map(|c| (c.name.clone(), LinkState::default()))
            .collect();
        let events = configs
            .iter()
            .map(|c| {
                let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
                (c.name.clone(), tx)
            })
            .collect();
        Self {
            configs,
            links: RwLock::new(links),
            events,
        }
    }

    pub fn configs(&self) -> &[AgentConfig] {
        &self.configs
    }

    pub async fn mark_connected(&self, name: &str) {
        let mut links = self.links.write().await;
        if let Some(link) = links.get_mut(name) {
            link.connected = true;
            link.connected_at = Some(Utc::now());
            link.last_seen = Some(Utc::now());
            link.last_error = None;
        }
    }

    pub async fn mark_disconnected(&self, name: &str, error: Option<String>) {
        let mut links = self.links.write().await;
        if let Some(link) = links.get_mut(name) {
            link.connected = false;
            link.connected_at = None;
            link.last_error = error;
            link.reconnects = link.reconnects.saturating_add(1);
        }
    }

    /// Record that a message arrived from an agent
    pub async fn touch(&self, name: &str) {
        let mut links = self.links.write().await;
        if let Some(link) = links.get_mut(name) {
            link.last_seen = Some(Utc::now());
        }
    }

    pub async fn is_connected(&self, name: &str) -> bool {
        let links = self.links.read().await;
        links.get(name).map_or(false, |l| l.connected)
    }

    pub async fn snapshot(&self) -> Vec<AgentInfo> {
        let links = self.links.read().await;
        self.configs
            .iter()
            .map(|config| {
                let link = links.get(&config.name);
                AgentInfo {
                    name: config.name.clone(),
                    url: config.url.clone(),
                    connected: link.map_or(false, |l| l.connected),
                    connected_at: link.and_then(|l| l.connected_at),
                    last_seen: link.and_then(|l| l.last_seen),
                    last_error: link.and_then(|l| l.last_error.clone()),
                    reconnects: link.map_or(0, |l| l.reconnects),
                }
            })
            .collect()
    }

    pub async fn get(&self, name: &str) -> Option<AgentInfo> {
        self.snapshot().await.into_iter().find(|a| a.name == name)
    }

    /// Fan an event from an agent out to its subscribers
    ///
    /// Events from unknown agents and sends without any subscriber are
    /// dropped.
    pub fn publish(&self, name: &str, event: AgentEvent) {
        if let Some(tx) = self.events.get(name) {
            let _ = tx.send(event);
        }
    }

    pub fn subscribe_events(&self, name: &str) -> Option<broadcast::Receiver<AgentEvent>> {
        self.events.get(name).map(|tx| tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(AgentConfig::parse_list("edge1=ws://10.0.0.2:9850/events"))
    }

    #[tokio::test]
    async fn test_connect_disconnect_cycle() {
        let reg = registry();
        assert!(!reg.is_connected("edge1").await);

        reg.mark_connected("edge1").await;
        assert!(reg.is_connected("edge1").await);
        let info = reg.get("edge1").await.unwrap();
        assert!(info.connected_at.is_some());
        assert_eq!(info.reconnects, 0);

        reg.mark_disconnected("edge1", Some("connection reset".into()))
            .await;
        let info = reg.get("edge1").await.unwrap();
        assert!(!info.connected);
        assert_eq!(info.last_error.as_deref(), Some("connection reset"));
        assert_eq!(info.reconnects, 1);
    }

    #[tokio::test]
    async fn test_snapshot_covers_all_configured_agents() {
        let reg = AgentRegistry::new(AgentConfig::parse_list(
            "edge1=ws://a/events,edge2=ws://b/events",
        ));
        let snapshot = reg.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|a| !a.connected));
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let reg = registry();
        reg.mark_connected("nope").await; // silently ignored
        assert!(reg.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_published_events_reach_subscribers() {
        let reg = registry();
        let mut rx = reg.subscribe_events("edge1").unwrap();

        reg.publish(
            "edge1",
            AgentEvent::Status {
                container: "web-1".into(),
                state: "running".into(),
            },
        );

        match rx.recv().await.unwrap() {
            AgentEvent::Status { container, state } => {
                assert_eq!(container, "web-1");
                assert_eq!(state, "running");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_agent_events_are_dropped() {
        let reg = registry();
        assert!(reg.subscribe_events("nope").is_none());
        // publish to an unknown agent must not panic
        reg.publish(
            "nope",
            AgentEvent::Stats {
                payload: serde_json::json!({}),
            },
        );
    }
}
