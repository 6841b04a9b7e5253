//! Tank server - room relay with the web client served alongside.

mod inject;

use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use server::DispatcherHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    dispatcher: DispatcherHandle,
    connections: Arc<AtomicUsize>,
    max_connections: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,server=debug")),
        )
        .init();

    info!("Tank server v{}", env!("CARGO_PKG_VERSION"));

    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  Static files: {}", config.server.static_dir);
    info!("  Map: {}x{} (generate: {})", config.map.width, config.map.height, config.map.generate);

    inject::run(&config.inject);

    let state = AppState {
        dispatcher: server::spawn_dispatcher(&config),
        connections: Arc::new(AtomicUsize::new(0)),
        max_connections: config.server.max_connections,
    };

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Game WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let open = state.connections.fetch_add(1, Ordering::AcqRel);
    if open >= state.max_connections {
        state.connections.fetch_sub(1, Ordering::AcqRel);
        warn!("Connection rejected (limit reached): {}", addr);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, addr, state.dispatcher.clone()).await;
        state.connections.fetch_sub(1, Ordering::AcqRel);
    })
}

/// Pump one socket between the client and the dispatcher.
async fn handle_websocket(socket: WebSocket, addr: SocketAddr, dispatcher: DispatcherHandle) {
    info!("New connection from {}", addr);

    let (mut write, mut read) = socket.split();
    let (conn, mut outbound) = dispatcher.open();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher.frame(conn, text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            dispatcher.frame(conn, text);
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
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    warn!("Failed to send to {}: {}", addr, e);
                    break;
                }
            }
        }
    }

    dispatcher.close(conn);
}
