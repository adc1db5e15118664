//! Server module - accepts upgrades, tracks live sessions, serves health
//! and admin endpoints, and coordinates graceful shutdown.
//!
//! Routes:
//!
//! | Path        | Purpose                                   |
//! |-------------|-------------------------------------------|
//! | `/ws`       | game session upgrade                      |
//! | `/ws/admin` | read-only admin fan-out (1 Hz)            |
//! | `/health`   | liveness                                  |
//! | `/`         | landing static file                       |
//! | `/admin`    | admin UI static file                      |

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::core::engine::Engine;
use crate::session::{self, SessionConfig};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address. A leading `:` means all interfaces, e.g. `:8080`.
    pub addr: String,
    /// Directory holding `index.html` and `admin.html`.
    pub static_dir: PathBuf,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ":8080".to_string(),
            static_dir: PathBuf::from("static"),
            session: SessionConfig::default(),
        }
    }
}

fn normalize_addr(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

/// A live session as seen by the registry: enough to answer admin queries
/// without touching the session's tasks.
pub struct SessionEntry {
    pub address: String,
    pub connected_at: SystemTime,
    pub engine: Arc<RwLock<Engine>>,
}

/// Shared server state. The live-session map has exactly one mutator per
/// id (the session's own lifecycle); the admin fan-out only ever reads.
pub struct ServerState {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    total_clients: AtomicU64,
    peak_clients: AtomicU64,
    shutdown_tx: broadcast::Sender<()>,
    session_config: SessionConfig,
}

impl ServerState {
    fn new(session_config: SessionConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            sessions: RwLock::new(HashMap::new()),
            total_clients: AtomicU64::new(0),
            peak_clients: AtomicU64::new(0),
            shutdown_tx,
            session_config,
        }
    }

    async fn register(&self, id: String, entry: SessionEntry) {
        let count = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id, entry);
            sessions.len() as u64
        };
        self.total_clients.fetch_add(1, Ordering::Relaxed);
        self.peak_clients.fetch_max(count, Ordering::Relaxed);
    }

    async fn deregister(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    pub async fn client_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// The WebSocket server. Bind first, then run; tests use the bound address
/// before the accept loop starts.
pub struct Server {
    state: Arc<ServerState>,
    listener: TcpListener,
    static_dir: PathBuf,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let addr = normalize_addr(&config.addr);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self {
            state: Arc::new(ServerState::new(config.session)),
            listener,
            static_dir: config.static_dir,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr().context("listener has no address")
    }

    fn router(state: Arc<ServerState>, static_dir: &Path) -> Router {
        use tower_http::services::ServeFile;

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/ws/admin", get(admin_ws_handler))
            .route("/health", get(health_handler))
            .route_service("/", ServeFile::new(static_dir.join("index.html")))
            .route_service("/admin", ServeFile::new(static_dir.join("admin.html")))
            .with_state(state)
    }

    /// Serve until `shutdown` resolves, then close every session and drain
    /// for a bounded window before returning.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let app = Self::router(self.state.clone(), &self.static_dir);
        let serve = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .into_future();

        tokio::pin!(shutdown);
        tokio::select! {
            result = serve => {
                result.context("server runtime failed")?;
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, closing sessions");
                let _ = self.state.shutdown_tx.send(());
                drain_sessions(&self.state, Duration::from_secs(10)).await;
            }
        }

        Ok(())
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn drain_sessions(state: &ServerState, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = state.client_count().await;
        if remaining == 0 {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(remaining, "shutdown drain deadline exceeded");
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn next_session_id() -> String {
    let seq = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("session_{nanos}_{seq}")
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(state, socket, addr))
}

async fn handle_session(state: Arc<ServerState>, socket: WebSocket, addr: SocketAddr) {
    let id = next_session_id();
    let engine = Arc::new(RwLock::new(Engine::new()));

    state
        .register(
            id.clone(),
            SessionEntry {
                address: addr.to_string(),
                connected_at: SystemTime::now(),
                engine: engine.clone(),
            },
        )
        .await;
    let total = state.client_count().await;
    info!(session = %id, address = %addr, total, "client connected");

    let shutdown_rx = state.shutdown_tx.subscribe();
    session::run(socket, id.clone(), engine, state.session_config.clone(), shutdown_rx).await;

    state.deregister(&id).await;
    let total = state.client_count().await;
    info!(session = %id, total, "client disconnected");
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let clients = state.client_count().await;
    Json(json!({
        "status": "ok",
        "clients": clients,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminClient {
    id: String,
    address: String,
    /// Seconds since the Unix epoch.
    connect_time: u64,
    game_state: String,
    score: u64,
    level: u32,
    lines: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminReport {
    current_clients: usize,
    total_clients: u64,
    peak_clients: u64,
    clients: Vec<AdminClient>,
    timestamp: u64,
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

async fn build_admin_report(state: &ServerState) -> AdminReport {
    // Copy the entries out so no engine lock is taken while the session map
    // lock is held.
    let entries: Vec<(String, String, SystemTime, Arc<RwLock<Engine>>)> = {
        let sessions = state.sessions.read().await;
        sessions
            .iter()
            .map(|(id, entry)| {
                (
                    id.clone(),
                    entry.address.clone(),
                    entry.connected_at,
                    entry.engine.clone(),
                )
            })
            .collect()
    };

    let mut clients = Vec::with_capacity(entries.len());
    for (id, address, connected_at, engine) in entries {
        let (game_state, score, level, lines) = {
            let eng = engine.read().await;
            (
                eng.status().as_str().to_string(),
                eng.score(),
                eng.level(),
                eng.lines(),
            )
        };
        clients.push(AdminClient {
            id,
            address,
            connect_time: unix_secs(connected_at),
            game_state,
            score,
            level,
            lines,
        });
    }

    AdminReport {
        current_clients: clients.len(),
        total_clients: state.total_clients.load(Ordering::Relaxed),
        peak_clients: state.peak_clients.load(Ordering::Relaxed),
        clients,
        timestamp: unix_secs(SystemTime::now()),
    }
}

async fn admin_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_admin(state, socket))
}

/// Read-only status fan-out at 1 Hz. Never mutates any session.
async fn run_admin(state: Arc<ServerState>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = build_admin_report(&state).await;
                let payload = match serde_json::to_string(&report) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize admin report");
                        continue;
                    }
                };
                if sink.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            received = stream.next() => {
                match received {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
