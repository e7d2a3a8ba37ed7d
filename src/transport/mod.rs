//! Connection plumbing
//!
//! Reconnecting WebSocket client and its backoff policy, used to keep a
//! live link to each configured agent.

pub mod backoff;
pub mod ws;

pub use backoff::BackoffPolicy;
pub use ws::{SocketEvent, WsClient, WsClientConfig, WsHandle};
