//! Headless reference client.
//!
//! Connects to a server, prints every frame it receives, and answers pings
//! automatically through the client library. Useful for smoke-testing a
//! running server without a UI.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tetris_server::client::{ClientConfig, ClientEvent, GameClient};

#[derive(Debug, Parser)]
#[command(name = "tetris-client", about = "Headless Tetris reference client")]
struct Args {
    /// WebSocket URL of the server.
    #[arg(default_value = "ws://localhost:8080/ws")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut client = GameClient::start(ClientConfig {
        url: args.server,
        ..ClientConfig::default()
    });

    loop {
        tokio::select! {
            event = client.next_event() => {
                match event {
                    Some(ClientEvent::Connected) => eprintln!("connected"),
                    Some(ClientEvent::Disconnected) => eprintln!("disconnected"),
                    Some(ClientEvent::Frame(frame)) => println!("{frame}"),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
