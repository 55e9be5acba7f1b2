use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::Method,
    response::Response,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use devconnect_shared::UserId;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::hub::RelayHub;
use crate::rate_limit::TokenBucket;

#[derive(Clone)]
pub struct AppState {
    pub hub: RelayHub,
    pub config: Arc<RelayConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            hub: RelayHub::new(config.max_connections),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(relay_info))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct RelayInfoResponse {
    name: String,
    version: &'static str,
    connections: usize,
    online_users: usize,
    max_connections: usize,
    uptime_secs: u64,
}

#[derive(Deserialize)]
struct WsParams {
    user: UserId,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn relay_info(State(state): State<AppState>) -> Json<RelayInfoResponse> {
    Json(RelayInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        connections: state.hub.connection_count().await,
        online_users: state.hub.online_users().await.len(),
        max_connections: state.config.max_connections,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Result<Response, RelayError> {
    if !state.hub.has_capacity().await {
        return Err(RelayError::TooManyConnections {
            max: state.config.max_connections,
        });
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, params.user, state)))
}

/// One relay connection: a writer task drains the hub's queue into the
/// socket while this task reads inbound frames and hands them to the hub.
async fn handle_socket(socket: WebSocket, user: UserId, state: AppState) {
    let (conn, mut outbound) = match state.hub.register(user).await {
        Ok(registered) => registered,
        Err(e) => {
            warn!(user = %user.short(), error = %e, "Rejecting connection");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut budget = TokenBucket::new(state.config.events_per_sec, state.config.event_burst);
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                if !budget.try_consume() {
                    warn!(user = %user.short(), "Rate limit exceeded, dropping frame");
                    continue;
                }
                let frame: &str = &text;
                state.hub.relay(conn, frame).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.hub.unregister(conn).await;
    writer.abort();
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %listener.local_addr()?, "Starting relay server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
