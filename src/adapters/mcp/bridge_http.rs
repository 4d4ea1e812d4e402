//! Bridge HTTP server.
//!
//! Exposes the discovery document, the intake endpoint, and the per-client
//! event stream over HTTP.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::domain::models::{InvocationRequest, QueueError, ServerConfig};
use crate::services::{BridgeContext, DispatchLoop, Frame};

/// Discovery document endpoint; also accepts submissions.
pub const TOOLS_PATH: &str = "/mcp/tools";
/// Event stream endpoint.
pub const STREAM_PATH: &str = "/mcp/sse";

/// Configuration for the bridge HTTP server.
#[derive(Debug, Clone)]
pub struct BridgeHttpConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Whether to enable CORS.
    pub enable_cors: bool,
}

impl Default for BridgeHttpConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for BridgeHttpConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            enable_cors: server.enable_cors,
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"`.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Requests waiting to be dispatched.
    pub queued: usize,
    /// Requests dispatched but not yet delivered.
    pub in_flight: usize,
    /// Whether a stream currently owns the queue.
    pub consumer_attached: bool,
    /// Startup time, RFC 3339.
    pub started_at: String,
}

/// Bridge HTTP server.
pub struct BridgeHttpServer {
    config: BridgeHttpConfig,
    context: Arc<BridgeContext>,
}

impl BridgeHttpServer {
    /// Server over a shared bridge context.
    pub fn new(context: Arc<BridgeContext>, config: BridgeHttpConfig) -> Self {
        Self { config, context }
    }

    /// Build the router with all endpoints.
    pub fn router(&self) -> Router {
        let app = Router::new()
            .route(TOOLS_PATH, get(list_tools))
            .route(STREAM_PATH, get(open_stream).post(submit))
            .route("/health", get(health_check))
            .with_state(Arc::clone(&self.context));

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    /// Start the server.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    ///
    /// Open streams are closed once `shutdown` resolves, so graceful
    /// shutdown does not wait on them forever.
    pub async fn serve_on<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        tracing::info!("Bridge HTTP server listening on {}", listener.local_addr()?);

        let context = Arc::clone(&self.context);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                context.shutdown();
            })
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_check(State(context): State<Arc<BridgeContext>>) -> Json<HealthResponse> {
    let queue = context.queue();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        queued: queue.len(),
        in_flight: queue.in_flight(),
        consumer_attached: queue.has_consumer(),
        started_at: context.started_at().to_rfc3339(),
    })
}

async fn list_tools(State(context): State<Arc<BridgeContext>>) -> Response {
    match context.manifest().render() {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render discovery document");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                    code: "MANIFEST_ERROR".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Intake endpoint. Never fails at the transport level for bad input.
async fn submit(State(context): State<Arc<BridgeContext>>, body: Bytes) -> (StatusCode, Json<Value>) {
    let acknowledged = (StatusCode::OK, Json(json!({"status": "ok"})));

    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        debug!(len = body.len(), "ignoring non-JSON submission");
        return acknowledged;
    };
    let Some(request) = InvocationRequest::from_envelope(&body) else {
        debug!("ignoring submission without an invocation envelope");
        return acknowledged;
    };

    let id = request.id.clone();
    match context.submit(request) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "received", "id": id})),
        ),
        Err(QueueError::DuplicateId(id)) => {
            warn!(request_id = %id, "duplicate in-flight request id");
            (
                StatusCode::CONFLICT,
                Json(json!({"status": "duplicate", "id": id})),
            )
        }
    }
}

async fn open_stream(State(context): State<Arc<BridgeContext>>) -> impl IntoResponse {
    let stream = frame_stream(context.open_stream());
    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Sse::new(stream),
    )
}

/// Convert a frame to its SSE wire form.
pub fn to_sse_event(frame: &Frame) -> Result<Event, axum::Error> {
    match frame {
        Frame::Manifest(document) => Event::default().event("manifest").json_data(document),
        Frame::Message(completed) => Event::default()
            .event("message")
            .json_data(completed.event()),
        Frame::Heartbeat => Ok(Event::default().comment("heartbeat")),
    }
}

/// Drive a dispatch loop as an SSE stream.
///
/// A frame that fails to serialize ends the stream with an error, which
/// tears down the connection. The loop is dropped right away so its
/// consumer role passes to the next stream.
fn frame_stream(dispatch: DispatchLoop) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(Some(dispatch), |state| async move {
        let mut dispatch = state?;
        let frame = dispatch.next_frame().await?;

        match to_sse_event(&frame) {
            Ok(event) => Some((Ok(event), Some(dispatch))),
            Err(e) => {
                error!(stream_id = %dispatch.stream_id(), error = %e, "failed to serialize frame");
                dispatch.close();
                Some((Err(e), None))
            }
        }
    })
}
