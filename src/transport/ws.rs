//! Reconnecting WebSocket client
//!
//! Dials a WebSocket endpoint and keeps the connection alive: on close or
//! error the `run` loop reconnects with jittered exponential backoff until
//! cancelled. A boolean flag guards against concurrent dial attempts.
//! Incoming text frames and connection state changes are delivered to the
//! owner over an mpsc channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::backoff::BackoffPolicy;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client configuration
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    pub url: String,
    /// Sent as the `x-api-key` header when present
    pub auth_token: Option<String>,
    pub backoff: BackoffPolicy,
    pub ping_interval: Duration,
}

impl WsClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            backoff: BackoffPolicy::default(),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Events delivered to the owner of the connection
#[derive(Debug, Clone)]
pub enum SocketEvent {
    Connected,
    Message(String),
    Disconnected { error: Option<String> },
}

/// Handle for interacting with a spawned client
#[derive(Clone)]
pub struct WsHandle {
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl WsHandle {
    /// Queue a text frame for delivery on the current connection
    pub async fn send(&self, text: String) -> anyhow::Result<()> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| anyhow::anyhow!("socket closed"))
    }

    /// Stop the reconnect loop and drop the connection
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Auto-reconnecting WebSocket client
pub struct WsClient {
    config: WsClientConfig,
    connecting: AtomicBool,
}

const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

impl WsClient {
    pub fn new(config: WsClientConfig) -> Self {
        Self {
            config,
            connecting: AtomicBool::new(false),
        }
    }

    /// Spawn the reconnect loop, returning a handle for send/close
    pub fn spawn(config: WsClientConfig, events: mpsc::Sender<SocketEvent>) -> WsHandle {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let handle = WsHandle {
            outbound: outbound_tx,
            cancel: cancel.clone(),
        };

        let client = WsClient::new(config);
        tokio::spawn(async move {
            client.run(events, outbound_rx, cancel).await;
        });

        handle
    }

    /// Reconnect loop: dial, drive the session, back off, repeat
    pub async fn run(
        &self,
        events: mpsc::Sender<SocketEvent>,
        mut outbound: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.connect().await {
                Ok(stream) => {
                    info!(url = %self.config.url, "WebSocket connected");
                    attempt = 0;
                    let _ = events.send(SocketEvent::Connected).await;

                    let error = self
                        .drive_session(stream, &events, &mut outbound, &cancel)
                        .await;

                    if cancel.is_cancelled() {
                        break;
                    }
                    let _ = events.send(SocketEvent::Disconnected { error }).await;
                }
                Err(e) => {
                    warn!(url = %self.config.url, error = %e, "WebSocket connect failed");
                    let _ = events
                        .send(SocketEvent::Disconnected {
                            error: Some(e.to_string()),
                        })
                        .await;
                }
            }

            let delay = self.config.backoff.delay(attempt);
            attempt = attempt.saturating_add(1);
            debug!(url = %self.config.url, attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Dial the endpoint once
    ///
    /// Errors when another attempt is already in flight.
    pub async fn connect(&self) -> anyhow::Result<WsStream> {
        if !self.try_begin_connect() {
            anyhow::bail!("connection attempt already in progress");
        }
        let result = self.dial().await;
        self.finish_connect();
        result
    }

    fn try_begin_connect(&self) -> bool {
        self.connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn finish_connect(&self) {
        self.connecting.store(false, Ordering::SeqCst);
    }

    async fn dial(&self) -> anyhow::Result<WsStream> {
        let url = Url::parse(&self.config.url)?;

        let mut request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri(self.config.url.as_str())
            .header("Host", url.host_str().unwrap_or("localhost"))
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            );
        if let Some(ref token) = self.config.auth_token {
            request = request.header("x-api-key", token.as_str());
        }
        let request = request.body(())?;

        let (stream, _) = connect_async(request).await?;
        Ok(stream)
    }

    /// Drive one established connection until it drops or is cancelled
    async fn drive_session(
        &self,
        stream: WsStream,
        events: &mpsc::Sender<SocketEvent>,
        outbound: &mut mpsc::Receiver<String>,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let (mut ws_tx, mut ws_rx) = stream.split();
        let mut ping_interval = tokio::time::interval(self.config.ping_interval);
        // the first tick fires immediately, skip it
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let _ = events.send(SocketEvent::Message(text)).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            // agents speak JSON text, tolerate binary frames
                            if let Ok(text) = String::from_utf8(data.to_vec()) {
                                let _ = events.send(SocketEvent::Message(text)).await;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = ws_tx.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!(url = %self.config.url, "Server closed connection");
                            return None;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Some(e.to_string());
                        }
                        None => {
                            return None;
                        }
                    }
                }

                Some(text) = outbound.recv() => {
                    if let Err(e) = ws_tx.send(Message::Text(text)).await {
                        return Some(e.to_string());
                    }
                }

                _ = ping_interval.tick() => {
                    if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                        return Some(e.to_string());
                    }
                }

                _ = cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_connect_guard_blocks_concurrent_attempts() {
        let client = WsClient::new(WsClientConfig::new("ws://localhost:1/events"));
        assert!(client.try_begin_connect());
        assert!(!client.try_begin_connect());
        client.finish_connect();
        assert!(client.try_begin_connect());
        client.finish_connect();
    }

    #[tokio::test]
    async fn test_connect_refuses_while_in_flight() {
        let client = Arc::new(WsClient::new(WsClientConfig::new("ws://localhost:1/events")));
        // simulate an in-flight dial
        assert!(client.try_begin_connect());
        let err = client.connect().await.unwrap_err();
        assert!(err.to_string().contains("already in progress"));
        client.finish_connect();
    }

    #[tokio::test]
    async fn test_handle_close_is_idempotent() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let handle = WsClient::spawn(
            WsClientConfig {
                url: "ws://127.0.0.1:1/events".to_string(),
                auth_token: None,
                backoff: BackoffPolicy {
                    initial: Duration::from_millis(10),
                    max: Duration::from_millis(10),
                    multiplier: 1.0,
                    jitter: 0.0,
                },
                ping_interval: Duration::from_secs(30),
            },
            events_tx,
        );
        assert!(!handle.is_closed());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_failed_dial_reports_disconnected() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let handle = WsClient::spawn(
            WsClientConfig {
                // nothing listens on port 1
                url: "ws://127.0.0.1:1/events".to_string(),
                auth_token: None,
                backoff: BackoffPolicy {
                    initial: Duration::from_millis(5),
                    max: Duration::from_millis(5),
                    multiplier: 1.0,
                    jitter: 0.0,
                },
                ping_interval: Duration::from_secs(30),
            },
            events_tx,
        );

        let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        assert!(matches!(event, SocketEvent::Disconnected { error: Some(_) }));
        handle.close();
    }
}
