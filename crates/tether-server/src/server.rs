//! `ChannelServer` — axum HTTP + WebSocket bootstrap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tether_core::envelope::Target;
use tether_core::{ConnectionId, Envelope, Handler};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::registry::Registry;
use crate::session::run_session;
use crate::shutdown::ShutdownCoordinator;
use crate::sweep::run_sweep;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live-connection registry.
    pub registry: Arc<Registry>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Connection admission limit.
    pub max_connections: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

/// Response body of the HTTP polling fallback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Whether the action was handled.
    pub success: bool,
    /// Result payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    fn success(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// The channel server: registry, sweep, and the HTTP surface.
pub struct ChannelServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ChannelServer {
    /// Create a new server dispatching to the given application handler.
    pub fn new(config: ServerConfig, handler: Arc<dyn Handler>) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::new(handler)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            max_connections: self.config.max_connections,
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .route("/api/action", post(action_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<tokio::net::TcpListener, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        Ok(tokio::net::TcpListener::bind(&addr).await?)
    }

    /// Serve until shutdown, running the liveness sweep alongside.
    pub async fn serve(self, listener: tokio::net::TcpListener) -> Result<(), ServerError> {
        info!(addr = %listener.local_addr()?, "channel server listening");

        let sweep = tokio::spawn(run_sweep(
            self.registry.clone(),
            Duration::from_secs(self.config.sweep_interval_secs),
            self.shutdown.token(),
        ));

        let token = self.shutdown.token();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;

        // Stops the sweep even when serve returned on its own.
        self.shutdown.shutdown();
        let _ = sweep.await;
        result.map_err(ServerError::Io)
    }

    /// Get the registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.count().await;
    Json(health::health_check(state.start_time, connections))
}

/// GET /ws — WebSocket upgrade.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.registry.count().await >= state.max_connections {
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }
    let registry = state.registry.clone();
    let shutdown = state.shutdown.token();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_session(socket, registry, shutdown))
        .into_response()
}

/// POST /api/action — the HTTP polling fallback.
///
/// Accepts `{action, ...params}` and mirrors the channel's message types
/// one-for-one: the action string becomes the envelope type, an explicit
/// `data` field (or the remaining params object) becomes the payload.
/// Broadcast-tagged handler output is still fanned out to live channel
/// members; the first outbound payload is returned to the polling caller.
async fn action_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<ActionResponse>) {
    let Value::Object(mut fields) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::failure("request body must be an object")),
        );
    };
    let Some(action) = fields.remove("action").and_then(|v| match v {
        Value::String(s) => Some(s),
        _ => None,
    }) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::failure("missing action")),
        );
    };

    if action == "ping" {
        return (StatusCode::OK, Json(ActionResponse::success(None)));
    }

    let data = match fields.remove("data") {
        Some(data) => Some(data),
        None if fields.is_empty() => None,
        None => Some(Value::Object(fields)),
    };
    let envelope = Envelope { kind: action, data };

    // A polling caller is not a registry member; it gets a fresh identity
    // per request.
    let request_id = ConnectionId::new();
    match state.registry.handler().handle(&request_id, envelope).await {
        Ok(outbound) => {
            let mut payload = None;
            for out in outbound {
                if out.target == Target::Broadcast {
                    state.registry.broadcast(&out.envelope).await;
                }
                if payload.is_none() {
                    payload = Some(out.envelope.data.unwrap_or(Value::Null));
                }
            }
            (StatusCode::OK, Json(ActionResponse::success(payload)))
        }
        Err(e) => (StatusCode::OK, Json(ActionResponse::failure(e.message()))),
    }
}
