//! WebSocket transport.

use crate::config::Config;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

pub mod dispatch;

pub use dispatch::{
    Command, DispatchSettings, Dispatcher, DispatcherHandle, run_dispatcher, spawn_dispatcher,
};

/// Connection tracking state (shared across connection handlers).
struct ConnectionState {
    total_connections: usize,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            total_connections: 0,
        }
    }

    /// Try to add a connection, returns true if allowed.
    fn try_add_connection(&mut self, max_total: usize) -> bool {
        if self.total_connections >= max_total {
            return false;
        }
        self.total_connections += 1;
        true
    }

    fn remove_connection(&mut self) {
        self.total_connections = self.total_connections.saturating_sub(1);
    }
}

/// Bind the configured address and serve until the listener fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);
    serve(listener, config).await
}

/// Accept WebSocket connections on `listener` and feed them to a fresh dispatcher.
pub async fn serve(listener: TcpListener, config: Config) -> anyhow::Result<()> {
    let handle = spawn_dispatcher(&config);
    let conn_state = Arc::new(RwLock::new(ConnectionState::new()));
    let max_connections = config.server.max_connections;

    loop {
        let (stream, addr) = listener.accept().await?;

        if !conn_state.write().await.try_add_connection(max_connections) {
            warn!("Connection rejected (limit reached): {}", addr);
            continue;
        }

        let handle = handle.clone();
        let conn_state = Arc::clone(&conn_state);
        tokio::spawn(async move {
            let result = handle_connection(stream, addr, handle).await;

            // Always remove from connection tracking when done
            conn_state.write().await.remove_connection();

            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Pump one WebSocket: inbound text to the dispatcher, queued frames back out.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: DispatcherHandle,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let (conn, mut outbound) = handle.open();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle.frame(conn, text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            handle.frame(conn, text);
                        }
                        Err(_) => warn!("Dropping non-UTF-8 frame from {}", addr),
                    },
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                if let Err(e) = write.send(Message::text(frame)).await {
                    warn!("Failed to send to {}: {}", addr, e);
                    break;
                }
            }
        }
    }

    handle.close(conn);
    Ok(())
}
