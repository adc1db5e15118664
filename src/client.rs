//! Client module - reference WebSocket client.
//!
//! Dials the server, answers every application-level `ping` with a `pong`
//! automatically (pings are not surfaced), and forwards all other frames raw
//! to the consumer. All writes go through a single bounded queue drained by
//! one task, satisfying the transport's one-writer requirement. On
//! disconnect with reconnect enabled, the client retries a few times with a
//! fixed delay.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::protocol::{self, ControlMessage};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub reconnect: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_string(),
            reconnect: true,
            max_retries: 5,
            retry_delay: Duration::from_secs(3),
            queue_capacity: 64,
        }
    }
}

/// Events surfaced to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    /// One decoded-from-transport frame, raw JSON. Pings are handled
    /// internally and never appear here.
    Frame(String),
    Disconnected,
}

/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("client is not running")]
    Closed,
}

/// Reference client handle.
pub struct GameClient {
    command_tx: mpsc::Sender<ControlMessage>,
    events_rx: mpsc::UnboundedReceiver<ClientEvent>,
    task: JoinHandle<()>,
}

impl GameClient {
    /// Start the client. Connection (and reconnection) happens in the
    /// background; watch for [`ClientEvent::Connected`].
    pub fn start(config: ClientConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.queue_capacity);
        let (event_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(supervisor(config, command_rx, event_tx));

        Self {
            command_tx,
            events_rx,
            task,
        }
    }

    /// Queue a control command for the writer task.
    pub async fn send(&self, command: ControlMessage) -> Result<(), ClientError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Next client event; `None` once the client has stopped for good.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.recv().await
    }

    /// Stop the client and its background task.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn supervisor(
    config: ClientConfig,
    mut command_rx: mpsc::Receiver<ControlMessage>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut attempts = 0u32;

    loop {
        match connect_async(&config.url).await {
            Ok((socket, _response)) => {
                attempts = 0;
                info!(url = %config.url, "connected");
                let _ = event_tx.send(ClientEvent::Connected);

                let handle_dropped = run_connection(socket, &mut command_rx, &event_tx).await;
                let _ = event_tx.send(ClientEvent::Disconnected);
                if handle_dropped {
                    return;
                }
            }
            Err(err) => {
                warn!(url = %config.url, error = %err, "connect failed");
            }
        }

        if !config.reconnect {
            return;
        }
        attempts += 1;
        if attempts > config.max_retries {
            info!("max reconnection attempts reached");
            return;
        }
        info!(attempt = attempts, max = config.max_retries, "reconnecting");
        tokio::time::sleep(config.retry_delay).await;
    }
}

/// Drive one connection until it drops. Returns true when the client handle
/// itself was dropped (no reconnect wanted).
async fn run_connection<S>(
    socket: tokio_tungstenite::WebSocketStream<S>,
    command_rx: &mut mpsc::Receiver<ControlMessage>,
    event_tx: &mpsc::UnboundedSender<ClientEvent>,
) -> bool
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                let Some(command) = command else {
                    return true;
                };
                if sink.send(Message::Text(command.encode().into())).await.is_err() {
                    return false;
                }
            }
            received = stream.next() => {
                let Some(Ok(message)) = received else {
                    return false;
                };
                match message {
                    Message::Text(raw) => {
                        // The server may coalesce frames with '\n'.
                        for frame in protocol::split_frames(raw.as_str()) {
                            if is_ping(frame) {
                                debug!("ping received, sending pong");
                                let pong = ControlMessage::Pong.encode();
                                if sink.send(Message::Text(pong.into())).await.is_err() {
                                    return false;
                                }
                            } else {
                                let _ = event_tx.send(ClientEvent::Frame(frame.to_string()));
                            }
                        }
                    }
                    Message::Close(_) => return false,
                    _ => {}
                }
            }
        }
    }
}

fn is_ping(frame: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(frame)
        .ok()
        .and_then(|value| {
            value
                .get("type")
                .and_then(|t| t.as_str())
                .map(|t| t == "ping")
        })
        .unwrap_or(false)
}
