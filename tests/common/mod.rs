//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use deskbridge::adapters::mcp::{BridgeHttpConfig, BridgeHttpServer};
use deskbridge::cli::commands::build_registry;
use deskbridge::domain::models::{Config, WindowSeed};
use deskbridge::services::BridgeContext;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Small display with one window, screenshots written under `dir`.
pub fn test_config(dir: &TempDir, heartbeat_interval_ms: u64) -> Config {
    let mut config = Config::default();
    config.stream.heartbeat_interval_ms = heartbeat_interval_ms;
    config.display.width = 320;
    config.display.height = 240;
    config.display.windows = vec![WindowSeed {
        title: "Untitled - Notepad".to_string(),
        x: 20,
        y: 20,
        width: 100,
        height: 80,
    }];
    config.capture.screenshot_path = dir.path().join("shot.ppm");
    config
}

pub fn build_context(config: &Config) -> Arc<BridgeContext> {
    let registry = build_registry(config).expect("built-in tools should register");
    Arc::new(BridgeContext::new(registry, config.stream.clone()))
}

/// A bridge server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub context: Arc<BridgeContext>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start(heartbeat_interval_ms: u64) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = test_config(&dir, heartbeat_interval_ms);
        let context = build_context(&config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = BridgeHttpServer::new(Arc::clone(&context), BridgeHttpConfig::default());

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .serve_on(listener, async {
                    let _ = rx.await;
                })
                .await
                .expect("server should run");
        });

        Self {
            addr,
            context,
            shutdown: Some(tx),
            handle: Some(handle),
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn submit(&self, body: Value) -> (u16, Value) {
        let response = reqwest::Client::new()
            .post(self.url("/mcp/sse"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    pub async fn call(&self, id: impl Into<Value>, tool: &str, arguments: Value) -> Value {
        let (status, ack) = self.submit(envelope(id, tool, arguments)).await;
        assert_eq!(status, 200, "submission should be accepted: {ack}");
        assert_eq!(ack["status"], "received");
        ack
    }

    pub async fn open_stream(&self) -> SseClient {
        let response = reqwest::get(self.url("/mcp/sse")).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        SseClient::new(response)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .expect("server should stop after shutdown")
                .unwrap();
        }
    }
}

pub fn envelope(id: impl Into<Value>, tool: &str, arguments: Value) -> Value {
    json!({
        "type": "request",
        "method": "tools/call",
        "id": id.into(),
        "params": {"name": tool, "arguments": arguments}
    })
}

/// One parsed server-sent event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Event { name: String, data: String },
    Comment(String),
}

impl SseFrame {
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Comment(text) if text == "heartbeat")
    }

    /// Parsed data of a `message` event, or `None` for anything else.
    pub fn message(&self) -> Option<Value> {
        match self {
            Self::Event { name, data } if name == "message" => serde_json::from_str(data).ok(),
            _ => None,
        }
    }
}

/// Minimal SSE reader over a streaming HTTP response.
pub struct SseClient {
    pub headers: reqwest::header::HeaderMap,
    body: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
}

impl SseClient {
    fn new(response: reqwest::Response) -> Self {
        Self {
            headers: response.headers().clone(),
            body: Box::pin(response.bytes_stream()),
            buffer: String::new(),
        }
    }

    /// Next complete frame, waiting at most `timeout`.
    pub async fn next_within(&mut self, timeout: Duration) -> Option<SseFrame> {
        tokio::time::timeout(timeout, self.next_frame())
            .await
            .ok()
            .flatten()
    }

    pub async fn next_frame(&mut self) -> Option<SseFrame> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                if let Some(frame) = parse_block(&block) {
                    return Some(frame);
                }
                continue;
            }
            let chunk = self.body.next().await?.ok()?;
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Skip heartbeats until the next `message` event.
    pub async fn next_message(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let frame = self.next_within(remaining).await?;
            if let Some(message) = frame.message() {
                return Some(message);
            }
        }
    }
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut name = None;
    let mut data: Vec<&str> = Vec::new();
    let mut comment = None;

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix(':') {
            comment = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("event:") {
            name = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    match (name, comment) {
        (Some(name), _) => Some(SseFrame::Event {
            name,
            data: data.join("\n"),
        }),
        (None, Some(comment)) => Some(SseFrame::Comment(comment)),
        (None, None) if !data.is_empty() => Some(SseFrame::Event {
            name: "message".to_string(),
            data: data.join("\n"),
        }),
        _ => None,
    }
}
