//! HTTP handlers and route assembly

pub mod agents;
pub mod containers;
pub mod health;
pub mod images;
pub mod jobs;
pub mod networks;
pub mod stacks;
pub mod system;
pub mod volumes;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(system::router())
        .merge(containers::router())
        .merge(images::router())
        .merge(networks::router())
        .merge(volumes::router())
        .merge(stacks::router())
        .merge(jobs::router())
        .merge(agents::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
