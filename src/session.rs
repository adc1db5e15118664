//! Session module - one game per WebSocket connection.
//!
//! Three cooperating tasks share the session's engine and outbound queue:
//!
//! 1. **Reader** - decodes control frames one at a time, dispatches them to
//!    the engine, and queues the resulting `state` snapshot before the next
//!    frame is accepted.
//! 2. **Writer + ticker** - drains the outbound queue (coalescing ready
//!    frames with `\n` into one text message, each write under a deadline)
//!    and runs the periodic engine tick.
//! 3. **Heartbeat** - queues an application-level `ping` at a fixed interval
//!    and closes the connection with reason "timeout" when no pong arrives
//!    inside the timeout window.
//!
//! The outbound queue is bounded. `state` and `ping` frames use non-blocking
//! sends and are dropped when the queue is full (the next snapshot
//! supersedes a lost one); `error`, `game_over` and close frames must not be
//! lost and use a blocking send with a short deadline instead.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::engine::Engine;
use crate::core::snapshot::GameSnapshot;
use crate::protocol::{self, ControlMessage, ServerMessage, ERROR_CODE_BAD_REQUEST};
use crate::types::GameStatus;

/// Normal closure, RFC 6455.
const CLOSE_NORMAL: u16 = 1000;

/// Per-session timing and queue configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Engine tick cadence driven by the writer task.
    pub tick_interval: Duration,
    /// How often an application-level `ping` is sent.
    pub ping_interval: Duration,
    /// How long to wait for a pong before disconnecting.
    pub pong_timeout: Duration,
    /// Deadline for each outbound write.
    pub write_timeout: Duration,
    /// Deadline for queueing must-deliver frames when the queue is full.
    pub enqueue_timeout: Duration,
    /// Outbound queue capacity.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(200),
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            enqueue_timeout: Duration::from_secs(1),
            queue_capacity: 256,
        }
    }
}

/// Outbound queue entries consumed by the writer task.
#[derive(Debug, Clone)]
enum Outbound {
    Frame(String),
    Close { code: u16, reason: String },
}

enum Exit {
    Reader,
    Writer,
    Heartbeat,
    Shutdown,
}

/// Drive a session until the peer disconnects, the heartbeat expires, or
/// the server shuts down. Returns once every task has been released.
pub async fn run(
    socket: WebSocket,
    id: String,
    engine: Arc<RwLock<Engine>>,
    config: SessionConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (sink, stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<Outbound>(config.queue_capacity);
    let (pong_tx, pong_rx) = watch::channel(tokio::time::Instant::now());

    // Initial snapshot so the client can render before the first tick.
    {
        let eng = engine.read().await;
        enqueue_state(&out_tx, &id, &eng.snapshot());
    }

    let mut writer = tokio::spawn(writer_loop(
        sink,
        out_rx,
        engine.clone(),
        out_tx.clone(),
        config.clone(),
        id.clone(),
    ));
    let mut heartbeat = tokio::spawn(heartbeat_loop(
        out_tx.clone(),
        pong_rx,
        config.clone(),
        id.clone(),
    ));
    let mut reader = tokio::spawn(reader_loop(
        stream,
        engine,
        out_tx.clone(),
        pong_tx,
        config.clone(),
        id.clone(),
    ));

    let exit = tokio::select! {
        _ = &mut reader => Exit::Reader,
        _ = &mut writer => Exit::Writer,
        _ = &mut heartbeat => Exit::Heartbeat,
        _ = shutdown.recv() => Exit::Shutdown,
    };

    match exit {
        Exit::Reader => debug!(session = %id, "reader closed"),
        Exit::Writer => debug!(session = %id, "writer closed"),
        Exit::Heartbeat => debug!(session = %id, "heartbeat expired"),
        Exit::Shutdown => {
            let _ = out_tx
                .send_timeout(
                    Outbound::Close {
                        code: CLOSE_NORMAL,
                        reason: "server shutdown".to_string(),
                    },
                    config.enqueue_timeout,
                )
                .await;
        }
    }

    // Heartbeat and shutdown exits leave a close frame in the queue; give
    // the writer a bounded window to flush it.
    if matches!(exit, Exit::Heartbeat | Exit::Shutdown) {
        let _ = tokio::time::timeout(Duration::from_millis(500), &mut writer).await;
    }

    reader.abort();
    heartbeat.abort();
    writer.abort();
}

/// Reader: one frame at a time, in arrival order.
async fn reader_loop(
    mut stream: SplitStream<WebSocket>,
    engine: Arc<RwLock<Engine>>,
    out_tx: mpsc::Sender<Outbound>,
    pong_tx: watch::Sender<tokio::time::Instant>,
    config: SessionConfig,
    id: String,
) {
    while let Some(received) = stream.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_frame(raw.as_str(), &engine, &out_tx, &pong_tx, &config, &id).await;
            }
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => {
                    handle_frame(text, &engine, &out_tx, &pong_tx, &config, &id).await;
                }
                Err(_) => {
                    enqueue_error(&out_tx, "invalid utf8 message", &config, &id).await;
                }
            },
            // Transport-level pong counts as liveness too.
            Message::Pong(_) => {
                let _ = pong_tx.send(tokio::time::Instant::now());
            }
            Message::Close(_) => break,
            Message::Ping(_) => {}
        }
    }
}

/// Decode, guard, dispatch, respond.
async fn handle_frame(
    raw: &str,
    engine: &Arc<RwLock<Engine>>,
    out_tx: &mpsc::Sender<Outbound>,
    pong_tx: &watch::Sender<tokio::time::Instant>,
    config: &SessionConfig,
    id: &str,
) {
    let command = match protocol::parse_control(raw) {
        Ok(command) => command,
        Err(err) => {
            debug!(session = %id, error = %err, "rejected frame");
            enqueue_error(out_tx, &err.to_string(), config, id).await;
            return;
        }
    };

    if command == ControlMessage::Pong {
        let _ = pong_tx.send(tokio::time::Instant::now());
        return;
    }

    let snapshot = {
        let mut eng = engine.write().await;

        if eng.is_game_over() && command != ControlMessage::Restart {
            drop(eng);
            enqueue_error(out_tx, "game is over", config, id).await;
            return;
        }

        debug!(session = %id, command = command.name(), "command");
        match command {
            ControlMessage::MoveLeft => {
                eng.move_left();
            }
            ControlMessage::MoveRight => {
                eng.move_right();
            }
            ControlMessage::MoveDown => {
                eng.move_down();
            }
            ControlMessage::Rotate => {
                eng.rotate();
            }
            ControlMessage::HardDrop => {
                eng.hard_drop();
            }
            ControlMessage::Pause => eng.pause(),
            ControlMessage::Resume => eng.resume(),
            ControlMessage::TogglePause => eng.toggle_pause(),
            // Restart swaps in a fresh engine under the same lock.
            ControlMessage::Restart => *eng = Engine::new(),
            ControlMessage::Pong => {}
        }

        eng.snapshot()
    };

    enqueue_state(out_tx, id, &snapshot);
    if snapshot.status == GameStatus::GameOver {
        enqueue_game_over(out_tx, &snapshot, config, id).await;
    }
}

/// Writer + ticker: serializes all socket writes and owns the engine tick.
async fn writer_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<Outbound>,
    engine: Arc<RwLock<Engine>>,
    out_tx: mpsc::Sender<Outbound>,
    config: SessionConfig,
    id: String,
) {
    let mut tick = tokio::time::interval(config.tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = out_rx.recv() => {
                let Some(first) = received else { break };

                let mut pending_close = None;
                let payload = match first {
                    Outbound::Frame(line) => {
                        let mut payload = line;
                        // Coalesce whatever else is ready into one message.
                        while let Ok(next) = out_rx.try_recv() {
                            match next {
                                Outbound::Frame(line) => {
                                    payload.push('\n');
                                    payload.push_str(&line);
                                }
                                Outbound::Close { code, reason } => {
                                    pending_close = Some((code, reason));
                                    break;
                                }
                            }
                        }
                        Some(payload)
                    }
                    Outbound::Close { code, reason } => {
                        pending_close = Some((code, reason));
                        None
                    }
                };

                if let Some(payload) = payload {
                    let send = sink.send(Message::Text(payload.into()));
                    match tokio::time::timeout(config.write_timeout, send).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            debug!(session = %id, error = %err, "write failed");
                            break;
                        }
                        Err(_) => {
                            warn!(session = %id, "write deadline exceeded");
                            break;
                        }
                    }
                }

                if let Some((code, reason)) = pending_close {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    let _ = tokio::time::timeout(
                        config.write_timeout,
                        sink.send(Message::Close(Some(frame))),
                    )
                    .await;
                    break;
                }
            }
            _ = tick.tick() => {
                let snapshot = {
                    let mut eng = engine.write().await;
                    if !eng.is_playing() {
                        continue;
                    }
                    eng.tick(Instant::now());
                    eng.snapshot()
                };

                enqueue_state(&out_tx, &id, &snapshot);
                if snapshot.status == GameStatus::GameOver {
                    enqueue_game_over(&out_tx, &snapshot, &config, &id).await;
                }
            }
        }
    }
}

/// Heartbeat: queues pings and enforces the pong timeout.
async fn heartbeat_loop(
    out_tx: mpsc::Sender<Outbound>,
    mut pong_rx: watch::Receiver<tokio::time::Instant>,
    config: SessionConfig,
    id: String,
) {
    let mut ping = tokio::time::interval(config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // An interval's first tick fires immediately; the first ping should not.
    ping.tick().await;

    loop {
        let deadline = *pong_rx.borrow() + config.pong_timeout;

        tokio::select! {
            _ = ping.tick() => {
                let timestamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs() as i64;
                match ServerMessage::ping(timestamp).encode() {
                    // Droppable like state frames; the next ping supersedes.
                    Ok(line) => {
                        let _ = out_tx.try_send(Outbound::Frame(line));
                    }
                    Err(err) => warn!(session = %id, error = %err, "failed to serialize ping"),
                }
            }
            changed = pong_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                info!(session = %id, "heartbeat timeout, disconnecting");
                let _ = out_tx
                    .send_timeout(
                        Outbound::Close {
                            code: CLOSE_NORMAL,
                            reason: "timeout".to_string(),
                        },
                        config.enqueue_timeout,
                    )
                    .await;
                return;
            }
        }
    }
}

/// Queue a `state` frame. Non-blocking: a full queue drops the frame, since
/// the next snapshot supersedes it.
fn enqueue_state(out_tx: &mpsc::Sender<Outbound>, id: &str, snapshot: &GameSnapshot) {
    match ServerMessage::state(snapshot).encode() {
        Ok(line) => {
            let _ = out_tx.try_send(Outbound::Frame(line));
        }
        Err(err) => warn!(session = %id, error = %err, "failed to serialize state"),
    }
}

/// Queue an `error` frame. Must-deliver: blocks up to the enqueue deadline.
async fn enqueue_error(
    out_tx: &mpsc::Sender<Outbound>,
    message: &str,
    config: &SessionConfig,
    id: &str,
) {
    match ServerMessage::error(message, ERROR_CODE_BAD_REQUEST).encode() {
        Ok(line) => {
            if out_tx
                .send_timeout(Outbound::Frame(line), config.enqueue_timeout)
                .await
                .is_err()
            {
                warn!(session = %id, "dropping error frame, outbound queue stalled");
            }
        }
        Err(err) => warn!(session = %id, error = %err, "failed to serialize error"),
    }
}

/// Queue a `game_over` frame. Must-deliver, like errors.
async fn enqueue_game_over(
    out_tx: &mpsc::Sender<Outbound>,
    snapshot: &GameSnapshot,
    config: &SessionConfig,
    id: &str,
) {
    match ServerMessage::game_over(snapshot).encode() {
        Ok(line) => {
            if out_tx
                .send_timeout(Outbound::Frame(line), config.enqueue_timeout)
                .await
                .is_err()
            {
                warn!(session = %id, "dropping game_over frame, outbound queue stalled");
            }
        }
        Err(err) => warn!(session = %id, error = %err, "failed to serialize game_over"),
    }
}
