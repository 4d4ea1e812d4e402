//! Process-wide bridge context.
//!
//! Owns the registry, the single invocation queue, and the shutdown signal.
//! Constructed once at startup and shared by the intake path and every
//! stream's dispatch loop.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::domain::models::{InvocationQueue, InvocationRequest, QueueError, StreamConfig};
use crate::services::capability_registry::CapabilityRegistry;
use crate::services::dispatch_loop::DispatchLoop;
use crate::services::dispatcher::Dispatcher;
use crate::services::manifest::ManifestPublisher;

/// State shared by every request handler and stream.
#[derive(Debug)]
pub struct BridgeContext {
    registry: Arc<CapabilityRegistry>,
    queue: Arc<InvocationQueue>,
    dispatcher: Arc<Dispatcher>,
    manifest: Arc<ManifestPublisher>,
    stream: StreamConfig,
    shutdown: watch::Sender<bool>,
    started_at: DateTime<Utc>,
}

impl BridgeContext {
    /// Context over `registry`, with an empty queue.
    pub fn new(registry: CapabilityRegistry, stream: StreamConfig) -> Self {
        let registry = Arc::new(registry);
        let (shutdown, _) = watch::channel(false);

        Self {
            queue: Arc::new(InvocationQueue::new()),
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&registry))),
            manifest: Arc::new(ManifestPublisher::new(Arc::clone(&registry))),
            registry,
            stream,
            shutdown,
            started_at: Utc::now(),
        }
    }

    /// Queue an accepted submission for dispatch.
    pub fn submit(&self, request: InvocationRequest) -> Result<(), QueueError> {
        let id = request.id.clone();
        let tool = request.tool_name.clone();
        self.queue.push(request)?;
        info!(request_id = %id, %tool, queued = self.queue.len(), "request queued");
        Ok(())
    }

    /// Start a new stream. Closes on its own when [`shutdown`](Self::shutdown) is called.
    pub fn open_stream(&self) -> DispatchLoop {
        DispatchLoop::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.manifest),
            &self.stream,
            Some(self.shutdown.subscribe()),
        )
    }

    /// Signal every open stream to close.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Registered tools.
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// The single invocation queue.
    pub fn queue(&self) -> &Arc<InvocationQueue> {
        &self.queue
    }

    /// Discovery document publisher.
    pub fn manifest(&self) -> &ManifestPublisher {
        &self.manifest
    }

    /// Heartbeat and batching settings.
    pub fn stream_config(&self) -> &StreamConfig {
        &self.stream
    }

    /// When the context was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
