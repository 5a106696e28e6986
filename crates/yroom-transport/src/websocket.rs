//! WebSocket transport for yroom
//!
//! One TCP listener per process. Plain HTTP requests on any path get a
//! static confirmation body; upgrade requests become persistent binary
//! message channels handled by the relay. The room name comes from the
//! request path.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};

use crate::relay::{ConnectionHandler, ServerContext};

/// Room used when the request path is empty.
pub const DEFAULT_ROOM: &str = "default";

const HEALTH_BODY: &str = "yroom WebSocket relay\n";

/// WebSocket relay server.
pub struct WebSocketServer {
    ctx: Arc<ServerContext>,
    addr: SocketAddr,
}

impl WebSocketServer {
    pub fn new(ctx: Arc<ServerContext>, addr: SocketAddr) -> Self {
        Self { ctx, addr }
    }

    /// Start accepting connections. Runs until the process exits.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "yroom WebSocket server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, ctx).await {
                            error!(peer = %peer_addr, error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Room name from the request path: leading separator stripped, query
/// string removed, empty result resolves to the default room.
fn room_from_path(path: &str) -> String {
    let name = path
        .trim_start_matches('/')
        .split('?')
        .next()
        .unwrap_or("");
    if name.is_empty() {
        DEFAULT_ROOM.to_string()
    } else {
        name.to_string()
    }
}

/// Sniff the request without consuming it. Request headers are assumed to
/// arrive in the first segment.
async fn is_upgrade_request(stream: &TcpStream) -> std::io::Result<bool> {
    let mut buf = [0u8; 1024];
    let n = stream.peek(&mut buf).await?;
    let head = String::from_utf8_lossy(&buf[..n]).to_ascii_lowercase();
    Ok(head.contains("upgrade: websocket"))
}

/// Answer a plain HTTP request with the static confirmation text.
async fn serve_health(mut stream: TcpStream) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    let _ = stream.read(&mut buf).await?;
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        HEALTH_BODY.len(),
        HEALTH_BODY
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !is_upgrade_request(&stream).await? {
        serve_health(stream).await?;
        return Ok(());
    }

    let mut room_name = DEFAULT_ROOM.to_string();
    let ws_stream = accept_hdr_async(stream, |req: &Request, resp: Response| {
        room_name = room_from_path(req.uri().path());
        Ok(resp)
    })
    .await?;

    info!(
        peer = %peer_addr,
        room = %room_name,
        occupancy = ctx.registry.room_occupancy(&room_name),
        active_rooms = ?ctx.registry.active_rooms(),
        "WebSocket client connected"
    );

    let (mut sink, mut source) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let handler = ConnectionHandler::attach(ctx, &room_name, tx);

    loop {
        tokio::select! {
            // Drain the fire-and-forget outbound queue into the socket
            outbound = rx.recv() => {
                match outbound {
                    Some(bytes) => {
                        if sink.send(WsMessage::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Process inbound frames to completion, one at a time
            inbound = source.next() => {
                match inbound {
                    Some(Ok(WsMessage::Binary(data))) => {
                        handler.handle_message(&data);
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        if sink.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!(peer = %peer_addr, conn = %handler.conn_id(), "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Text and pong frames are not part of the protocol
                    }
                    Some(Err(e)) => {
                        error!(peer = %peer_addr, conn = %handler.conn_id(), error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
        }
    }

    handler.cleanup();
    Ok(())
}
