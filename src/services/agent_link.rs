//! Remote agent links
//!
//! Keeps one reconnecting WebSocket per configured agent and folds the
//! connection lifecycle plus incoming events into the `AgentRegistry`.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::agent::AgentEvent;
use crate::state::{get_shutdown_token, AppState};
use crate::transport::{SocketEvent, WsClient, WsClientConfig, WsHandle};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Spawn a link task per configured agent
pub fn spawn_links(state: Arc<AppState>) -> Vec<WsHandle> {
    let mut handles = Vec::new();

    for config in state.agents.configs().to_vec() {
        let ws_config = WsClientConfig {
            auth_token: config.token.clone(),
            backoff: state.config.backoff.clone(),
            ..WsClientConfig::new(config.url.clone())
        };

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = WsClient::spawn(ws_config, events_tx);

        info!(agent = %config.name, url = %config.url, "Starting agent link");
        tokio::spawn(consume_events(
            state.clone(),
            config.name.clone(),
            events_rx,
            handle.clone(),
        ));

        handles.push(handle);
    }

    handles
}

async fn consume_events(
    state: Arc<AppState>,
    agent: String,
    mut events: mpsc::Receiver<SocketEvent>,
    handle: WsHandle,
) {
    let shutdown = get_shutdown_token();

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = shutdown.cancelled() => {
                handle.close();
                break;
            }
        };

        let Some(event) = event else {
            break;
        };

        match event {
            SocketEvent::Connected => {
                info!(agent = %agent, "Agent link established");
                state.agents.mark_connected(&agent).await;
            }
            SocketEvent::Disconnected { error } => {
                warn!(agent = %agent, error = ?error, "Agent link lost");
                state.agents.mark_disconnected(&agent, error).await;
            }
            SocketEvent::Message(text) => {
                state.agents.touch(&agent).await;
                handle_message(&state, &agent, &text);
            }
        }
    }
}

/// Parse a frame and fan it out to the agent's event subscribers
fn handle_message(state: &AppState, agent: &str, text: &str) {
    let event = match serde_json::from_str::<AgentEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(agent = %agent, error = %e, "Ignoring malformed agent event");
            return;
        }
    };

    match &event {
        AgentEvent::Stats { .. } => {
            debug!(agent = %agent, "Received agent stats");
        }
        AgentEvent::Log {
            container, stream, ..
        } => {
            debug!(agent = %agent, container = %container, stream = ?stream, "Received agent log line");
        }
        AgentEvent::Status { container, state } => {
            debug!(agent = %agent, container = %container, state = %state, "Agent container state change");
        }
    }

    state.agents.publish(agent, event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;

    fn state_with_agent() -> AppState {
        AppState::new(EnvConfig {
            api_key: "test-key".to_string(),
            port: 0,
            docker_bin: "docker".to_string(),
            stacks_dir: "./stacks".to_string(),
            agents: crate::config::AgentConfig::parse_list("edge1=ws://10.0.0.2:9850/events"),
            webhook_url: None,
            backoff: Default::default(),
        })
    }

    #[tokio::test]
    async fn test_incoming_frames_are_fanned_out() {
        let state = state_with_agent();
        let mut rx = state.agents.subscribe_events("edge1").unwrap();

        handle_message(
            &state,
            "edge1",
            r#"{"type":"log","container":"web-1","line":"ready","stream":"stdout"}"#,
        );

        match rx.recv().await.unwrap() {
            AgentEvent::Log {
                container,
                line,
                stream,
            } => {
                assert_eq!(container, "web-1");
                assert_eq!(line, "ready");
                assert_eq!(stream.as_deref(), Some("stdout"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_frames_are_not_fanned_out() {
        let state = state_with_agent();
        let mut rx = state.agents.subscribe_events("edge1").unwrap();

        handle_message(&state, "edge1", "not json");
        handle_message(&state, "edge1", r#"{"type":"telemetry"}"#);

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
