//! # Echo Session Server
//!
//! Accepts WebSocket connections and runs one JSON-RPC session per connection.
//!
//! Methods:
//! - `ping` answers `"pong"`
//! - `echo` answers with its params
//! - `subscribe` answers `true`, then sends the caller a `welcome` notification
//!
//! ## Usage
//! ```bash
//! cargo run --package echo-session-server -- --bind 127.0.0.1:8641
//! ```
//!
//! Any WebSocket client can talk to it, for example with websocat:
//! ```bash
//! echo '{"jsonrpc":"2.0","id":1,"method":"ping"}' | websocat ws://127.0.0.1:8641
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use json_rpc_session::websocket::accept;
use json_rpc_session::{CallHandler, FrameKind, MethodRouter, SessionConfig};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8641")]
    bind: SocketAddr,

    /// Largest inbound message accepted, in bytes
    #[arg(long, default_value_t = json_rpc_session::MAX_MESSAGE_BYTES)]
    max_message_bytes: usize,

    /// Send replies as text frames instead of binary frames
    #[arg(long, default_value = "false")]
    text_frames: bool,
}

fn build_router() -> MethodRouter {
    MethodRouter::new()
        .with_method("ping", |_session, _params, completion| {
            completion.resolve(json!("pong"));
            Ok(())
        })
        .with_method("echo", |_session, params, completion| {
            completion.resolve(Value::Object(params));
            Ok(())
        })
        .with_method("subscribe", |session, _params, completion| {
            completion.resolve(json!(true));
            session
                .send_notification("welcome", json!({"message": "subscribed"}))
                .map_err(json_rpc_session::CallError::unhandled)
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let frame_kind = if args.text_frames {
        FrameKind::Text
    } else {
        FrameKind::Binary
    };
    let config = SessionConfig::default()
        .with_max_message_bytes(args.max_message_bytes)
        .with_frame_kind(frame_kind);

    let router = build_router();
    info!(methods = ?router.registered_methods(), "Registered methods");
    let handler: Arc<dyn CallHandler> = Arc::new(router);

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Echo session server listening on ws://{}", listener.local_addr()?);

    loop {
        let (tcp, peer) = listener.accept().await.context("Failed to accept connection")?;
        let handler = handler.clone();
        let config = config.clone();

        tokio::spawn(async move {
            match accept(tcp, handler, config).await {
                Ok(connection) => {
                    info!(%peer, "Session opened");
                    connection.run().await;
                    info!(%peer, "Session closed");
                }
                Err(e) => warn!(%peer, error = %e, "WebSocket handshake failed"),
            }
        });
    }
}
