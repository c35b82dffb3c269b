//! HTTP/WebSocket front end
//!
//! Routes:
//! - `GET /ws` - WebSocket upgrade; one socket is one participant
//! - `GET /health` - relay counters as JSON
//!
//! Each socket is split into a reader loop, which validates frames and hands
//! them to the hub, and a writer task, which drains the connection's outbox.
//! When the writer stops (a stalled write, or the relay dropping the
//! connection for a full outbox) the reader stops with it.

use std::future::Future;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc::WeakSender;
use tokio::time::timeout;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::relay::{outbox, Relay, RelayHandle, RelayStats};

/// Longest a single frame write may take before the peer counts as gone
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct AppState {
    relay: RelayHandle,
    allowed_origin: Option<HeaderValue>,
}

/// Build the axum router over a running hub
pub fn router(relay: RelayHandle, config: &RelayConfig) -> RelayResult<Router> {
    let allowed_origin = config.allowed_origin()?;

    let cors = match &allowed_origin {
        Some(origin) => CorsLayer::new().allow_origin(origin.clone()),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([Method::GET, Method::POST]);

    let state = AppState {
        relay,
        allowed_origin,
    };

    Ok(Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    relay: RelayHandle,
    config: &RelayConfig,
    shutdown: F,
) -> RelayResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(relay, config)?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Bind the configured address, start a fresh hub and serve
pub async fn run<F>(config: RelayConfig, shutdown: F) -> RelayResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.socket_addr()).await?;
    info!(
        addr = %listener.local_addr()?,
        origin = config.client_url.as_deref().unwrap_or("*"),
        "Relay listening"
    );

    let (relay, _hub) = RelayHandle::spawn(Relay::new());
    serve(listener, relay, &config, shutdown).await?;

    info!("Relay shut down");
    Ok(())
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    if let (Some(allowed), Some(origin)) = (&state.allowed_origin, headers.get(header::ORIGIN)) {
        if !origin.as_bytes().eq_ignore_ascii_case(allowed.as_bytes()) {
            warn!(origin = ?origin, "Rejecting WebSocket from foreign origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state.relay))
}

async fn handle_socket(socket: WebSocket, relay: RelayHandle) {
    let (sender, mut outbound) = outbox();
    // The relay holds the only strong sender, so dropping the connection
    // there ends the writer
    let replies = sender.downgrade();

    let id = match relay.connect(sender).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Could not register connection");
            return;
        }
    };

    let span = info_span!("connection", participant = %id.short());
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(
        async move {
            while let Some(message) = outbound.recv().await {
                let frame = match message.encode() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, event = message.kind(), "Could not encode message");
                        continue;
                    }
                };
                match timeout(WRITE_TIMEOUT, sink.send(Message::Text(frame.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "Socket write failed");
                        break;
                    }
                    Err(_) => {
                        warn!("Socket write timed out");
                        break;
                    }
                }
            }
            let _ = timeout(WRITE_TIMEOUT, sink.close()).await;
        }
        .instrument(span.clone()),
    );

    async {
        loop {
            let frame = tokio::select! {
                frame = stream.next() => frame,
                _ = &mut writer => {
                    debug!("Writer stopped, closing connection");
                    break;
                }
            };

            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    debug!(error = %e, "Socket read failed");
                    break;
                }
                None => break,
            };

            match frame {
                Message::Text(text) => match ClientMessage::decode(text.as_str()) {
                    Ok(message) => {
                        if relay.submit(&id, message).is_err() {
                            break;
                        }
                    }
                    Err(e) => reject(&replies, e),
                },
                Message::Binary(_) => reject(
                    &replies,
                    RelayError::InvalidMessage("binary frames are not supported".to_string()),
                ),
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }

        let _ = relay.disconnect(&id);
    }
    .instrument(span)
    .await;

    writer.abort();
}

fn reject(replies: &WeakSender<ServerMessage>, error: RelayError) {
    warn!(error = %error, "Rejecting frame");
    if let Some(outbox) = replies.upgrade() {
        let _ = outbox.try_send(ServerMessage::Error {
            message: error.to_string(),
        });
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    stats: RelayStats,
}

async fn health_handler(State(state): State<AppState>) -> Response {
    match state.relay.stats().await {
        Ok(stats) => Json(HealthResponse {
            status: "ok",
            stats,
        })
        .into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}
