//! Agent link API

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::agent::AgentInfo;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct AgentsResponse {
    agents: Vec<AgentInfo>,
    connected: usize,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents", get(list_agents))
        .route("/agents/:name", get(get_agent))
        .route("/agents/:name/events", get(stream_agent_events))
}

/// GET /agents - all configured agents with link status, no auth
async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let agents = state.agents.snapshot().await;
    let connected = agents.iter().filter(|a| a.connected).count();
    Json(AgentsResponse { agents, connected })
}

/// GET /agents/:name - no auth
async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let agent = state
        .agents
        .get(&name)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Agent '{}'", name)))?;
    Ok(Json(agent))
}

/// GET /agents/:name/events - SSE, no auth
///
/// Streams the stats/log/status frames the agent sends, as JSON events.
async fn stream_agent_events(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let mut rx = state
        .agents
        .subscribe_events(&name)
        .ok_or_else(|| ApiError::not_found(format!("Agent '{}'", name)))?;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().data(json));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(agent = %name, lagged = n, "Agent event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}
