//! yroom Daemon (yroomd)
//!
//! The relay server process for yroom.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (port 1234)
//! yroomd
//!
//! # Custom port and bind address
//! yroomd --port 8080 --bind 127.0.0.1
//!
//! # Verbose relay logging
//! yroomd --log-level debug
//! ```
//!
//! Clients pick their room through the connection path: a client opening
//! `ws://host:1234/my-doc` joins room `my-doc`; an empty path joins the
//! default room.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use yroom_transport::{ServerContext, WebSocketServer};

/// yroom Daemon - WebSocket relay for collaborative editing
#[derive(Parser, Debug)]
#[command(name = "yroomd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "YROOM_PORT", default_value = "1234")]
    port: u16,

    /// Bind address
    #[arg(long, env = "YROOM_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "YROOM_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner();

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "Starting yroom daemon");

    let ctx = ServerContext::new();
    let server = WebSocketServer::new(ctx, addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "WebSocket server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    handle.abort();

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  yroom - collaborative editing relay
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
