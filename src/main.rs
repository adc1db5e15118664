//! Tetris server binary.
//!
//! Binds the given address, serves game sessions at `/ws`, and shuts down
//! gracefully on SIGINT/SIGTERM.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tetris_server::server::{Server, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "tetris-server", about = "Multi-session Tetris over WebSocket")]
struct Args {
    /// Address to bind, e.g. ":8080" or "127.0.0.1:9000".
    #[arg(default_value = ":8080")]
    addr: String,

    /// Directory holding the landing and admin pages.
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        addr: args.addr,
        static_dir: args.static_dir,
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await?;
    info!(addr = %server.local_addr()?, "listening");
    server.run().await
}
