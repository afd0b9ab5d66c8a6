//! WebSocket frame server
//!
//! Serves one WebSocket endpoint per stream type at `/ws/{stream_type}`.
//! Every connection renders the driver's latest scan as its stream type,
//! encodes it (chunking when needed) and sends the resulting binary messages.
//! Frame numbers count per connection from 0.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::driver::Driver;
use crate::protocol::{ChunkingConfig, FrameEncoder};
use crate::provider::FrameProvider;
use crate::scan::Scan;
use crate::types::StreamType;
use crate::{Result, StreamError};

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub fps: f64,
    pub max_message_size: usize,
    pub chunk_size: usize,
    pub clients: usize,
    /// Stream name to WebSocket path
    pub endpoints: BTreeMap<String, String>,
}

/// Text message sent before closing a connection that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ErrorMessage {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), kind: "error".to_string() }
    }
}

#[derive(Clone)]
struct AppState {
    scans: watch::Receiver<Option<Arc<Scan>>>,
    encoder: FrameEncoder,
    fps: f64,
    clients: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

/// A bound, not yet running, frame server.
pub struct StreamServer {
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
}

impl StreamServer {
    /// Bind the listener and start the scan driver.
    pub async fn bind<P>(addr: SocketAddr, chunking: ChunkingConfig, provider: P) -> Result<Self>
    where
        P: FrameProvider,
    {
        let encoder = FrameEncoder::new(chunking)?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StreamError::transport_with_source(format!("bind {addr}"), e))?;

        let cancel = CancellationToken::new();
        let channels = Driver::spawn_with_cancel(provider, cancel.child_token());

        let state = AppState {
            scans: channels.scans,
            encoder,
            fps: channels.tick_rate,
            clients: Arc::new(AtomicUsize::new(0)),
            cancel: cancel.clone(),
        };

        Ok(Self { listener, state, cancel })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| StreamError::transport_with_source("listener address", e))
    }

    /// Token that stops the server, its driver and every connection.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve until the shutdown token fires.
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        info!("Serving {} stream types on ws://{}", StreamType::ALL.len(), addr);
        for stream_type in StreamType::ALL {
            debug!("  ws://{}{} - {}", addr, stream_type.endpoint(), stream_type.description());
        }

        let cancel = self.cancel.clone();
        let app = router(self.state);
        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;

        self.cancel.cancel();
        info!("Server stopped");
        result.map_err(|e| StreamError::transport_with_source("server failed", e))
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/ws/{stream_type}", get(stream_socket))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let config = state.encoder.config();
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        fps: state.fps,
        max_message_size: config.max_message_size,
        chunk_size: config.chunk_size,
        clients: state.clients.load(Ordering::Relaxed),
        endpoints: StreamType::ALL
            .iter()
            .map(|s| (s.name().to_string(), s.endpoint()))
            .collect(),
    })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn stream_socket(
    Path(name): Path<String>,
    State(state): State<AppState>,
    ws: std::result::Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let stream_type = match name.parse::<StreamType>() {
        Ok(stream_type) => stream_type,
        Err(e) => {
            warn!("Rejected WebSocket for unknown stream '{}'", name);
            return (StatusCode::NOT_FOUND, Json(ErrorMessage::new(e.to_string()))).into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| handle_connection(socket, stream_type, state))
}

async fn handle_connection(mut socket: WebSocket, stream_type: StreamType, state: AppState) {
    let clients = state.clients.fetch_add(1, Ordering::Relaxed) + 1;
    info!("{} client connected ({} active)", stream_type, clients);

    match stream_frames(&mut socket, stream_type, &state).await {
        Ok(frames) => info!("{} stream finished after {} frames", stream_type, frames),
        Err(e @ StreamError::Transport { .. }) => {
            debug!("{} client went away: {}", stream_type, e);
        }
        Err(e) => {
            error!("Error in {} stream: {}", stream_type, e);
            if let Ok(text) = serde_json::to_string(&ErrorMessage::new(e.to_string())) {
                let _ = socket.send(Message::Text(text.into())).await;
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
    state.clients.fetch_sub(1, Ordering::Relaxed);
}

/// Send one frame per new scan until the source ends, the client leaves or
/// the server shuts down. Returns the number of frames sent.
async fn stream_frames(
    socket: &mut WebSocket,
    stream_type: StreamType,
    state: &AppState,
) -> Result<u32> {
    let mut scans = state.scans.clone();
    let mut frame_number = 0u32;

    loop {
        tokio::select! {
            _ = state.cancel.cancelled() => return Ok(frame_number),
            changed = scans.changed() => {
                if changed.is_err() {
                    return Ok(frame_number);
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => return Ok(frame_number),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(StreamError::transport_with_source("receive failed", e)),
            },
        }

        let Some(scan) = scans.borrow_and_update().clone() else {
            info!("Scan source ended");
            return Ok(frame_number);
        };

        let frame = scan.to_frame(stream_type, frame_number)?;
        for message in state.encoder.encode(&frame)? {
            socket
                .send(Message::Binary(message))
                .await
                .map_err(|e| StreamError::transport_with_source("send failed", e))?;
        }
        frame_number = frame_number.wrapping_add(1);
    }
}
