//! Per-stream dispatch loop.
//!
//! Each open event stream owns one [`DispatchLoop`]. The loop emits the
//! discovery document first, then cycles: take the consumer lease if it is
//! free, hand out up to `max_dispatch_per_tick` message frames in FIFO order,
//! and finish the cycle with a heartbeat.
//!
//! Cycles run when the heartbeat interval elapses, or earlier when work is
//! waiting and this loop may consume it.
//!
//! A request is dequeued only after the previous message frame has been
//! handed out, and each handler runs on its own task. Closing a stream
//! therefore never cancels a handler: an event that finishes after its
//! stream is gone is parked on the queue and delivered by the next consumer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::domain::models::{Claimed, Completed, ConsumerLease, InvocationQueue, StreamConfig};
use crate::services::dispatcher::Dispatcher;
use crate::services::manifest::{DiscoveryDocument, ManifestPublisher};

/// Lifecycle of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing sent yet; the manifest goes out next.
    Opened,
    /// Cycling through messages and heartbeats.
    Streaming,
    /// Finished; no more frames.
    Closed,
}

/// One unit of stream output.
#[derive(Debug, PartialEq)]
pub enum Frame {
    /// The discovery document, always first.
    Manifest(DiscoveryDocument),
    /// A correlated result or error. Its id stays reserved until the frame
    /// is dropped.
    Message(Completed),
    /// End-of-cycle keep-alive.
    Heartbeat,
}

/// Dispatch loop bound to one event stream.
pub struct DispatchLoop {
    stream_id: Uuid,
    state: StreamState,
    queue: Arc<InvocationQueue>,
    dispatcher: Arc<Dispatcher>,
    manifest: Arc<ManifestPublisher>,
    interval: Duration,
    max_per_tick: usize,
    lease: Option<ConsumerLease>,
    /// Message frames still allowed in the current cycle; `None` between cycles.
    budget: Option<usize>,
    in_flight: Option<oneshot::Receiver<Completed>>,
    next_tick: Instant,
    cycles: u64,
    shutdown: Option<watch::Receiver<bool>>,
    span: Span,
}

impl DispatchLoop {
    /// Create a loop in the [`StreamState::Opened`] state.
    pub fn new(
        queue: Arc<InvocationQueue>,
        dispatcher: Arc<Dispatcher>,
        manifest: Arc<ManifestPublisher>,
        config: &StreamConfig,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> Self {
        let stream_id = Uuid::new_v4();
        let span = info_span!("stream", %stream_id);
        let interval = Duration::from_millis(config.heartbeat_interval_ms);

        Self {
            stream_id,
            state: StreamState::Opened,
            queue,
            dispatcher,
            manifest,
            interval,
            max_per_tick: config.max_dispatch_per_tick.max(1),
            lease: None,
            budget: None,
            in_flight: None,
            next_tick: Instant::now(),
            cycles: 0,
            shutdown,
            span,
        }
    }

    /// Identifier carried by this stream's log span.
    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Whether this stream currently holds the consumer role.
    pub fn is_consumer(&self) -> bool {
        self.lease.is_some()
    }

    /// Produce the next frame, or `None` once the stream is closed.
    ///
    /// Cancel safe: a dispatch started by a dropped call is picked up by the
    /// next call.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        let span = self.span.clone();
        self.advance().instrument(span).await
    }

    /// Stop the loop and give up the consumer role.
    ///
    /// A handler that is still running keeps running; its event is parked
    /// for the next consumer.
    pub fn close(&mut self) {
        if self.state != StreamState::Closed {
            self.state = StreamState::Closed;
            self.budget = None;
            if let Some(mut receiver) = self.in_flight.take() {
                receiver.close();
                if let Ok(completed) = receiver.try_recv() {
                    completed.park();
                }
            }
            self.lease = None;
            let _guard = self.span.enter();
            info!(cycles = self.cycles, "stream closed");
        }
    }

    async fn advance(&mut self) -> Option<Frame> {
        match self.state {
            StreamState::Closed => None,
            StreamState::Opened => {
                self.state = StreamState::Streaming;
                info!("stream opened");
                Some(Frame::Manifest(self.manifest.build()))
            }
            StreamState::Streaming => {
                if self.budget.is_none() {
                    if self.cycles > 0 && !self.wait_for_cycle().await {
                        self.close();
                        return None;
                    }
                    self.begin_cycle();
                }

                if let Some(completed) = self.next_completed().await {
                    return Some(Frame::Message(completed));
                }
                self.budget = None;
                Some(Frame::Heartbeat)
            }
        }
    }

    fn begin_cycle(&mut self) {
        self.cycles += 1;
        let now = Instant::now();
        if now >= self.next_tick {
            self.next_tick = now + self.interval;
        }

        if self.lease.is_none() {
            self.lease = self.queue.try_acquire_consumer();
            if self.lease.is_some() {
                info!("acquired queue consumer role");
            }
        }
        self.budget = Some(self.max_per_tick);
    }

    /// Next event for this cycle: a parked event first, then the oldest
    /// queued request run to completion. `None` ends the cycle.
    async fn next_completed(&mut self) -> Option<Completed> {
        if self.in_flight.is_none() {
            let budget = self.budget.as_mut().filter(|left| **left > 0)?;
            let lease = self.lease.as_ref()?;

            if let Some(parked) = lease.try_take_parked() {
                *budget -= 1;
                debug!(request_id = %parked.event().id(), "redelivering parked event");
                return Some(parked);
            }

            let claimed = lease.try_pop()?;
            *budget -= 1;
            self.in_flight = Some(spawn_dispatch(Arc::clone(&self.dispatcher), claimed));
        }

        let receiver = self.in_flight.as_mut()?;
        let outcome = receiver.await;
        self.in_flight = None;

        match outcome {
            Ok(completed) => {
                let event = completed.event();
                debug!(request_id = %event.id(), error = event.is_error(), "dispatched");
                Some(completed)
            }
            Err(_) => {
                warn!("dispatch task ended without an event");
                None
            }
        }
    }

    /// Wait until the next cycle is due. Returns `false` on shutdown.
    async fn wait_for_cycle(&self) -> bool {
        let notified = self.queue.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.has_ready_work() {
            return true;
        }

        let shutdown = self.shutdown.clone();
        tokio::select! {
            biased;
            stop = shutdown_requested(shutdown) => !stop,
            _ = tokio::time::sleep_until(self.next_tick) => true,
            _ = &mut notified => true,
        }
    }

    fn has_ready_work(&self) -> bool {
        self.queue.has_work() && (self.lease.is_some() || !self.queue.has_consumer())
    }
}

/// Run one request on its own task so that dropping the stream cannot
/// cancel the handler. An event nobody is waiting for is parked.
fn spawn_dispatch(dispatcher: Arc<Dispatcher>, claimed: Claimed) -> oneshot::Receiver<Completed> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(
        async move {
            let event = dispatcher.dispatch(claimed.request()).await;
            let completed = claimed.complete(event);
            if let Err(completed) = tx.send(completed) {
                info!(request_id = %completed.event().id(), "stream closed during dispatch, parking event");
                completed.park();
            }
        }
        .in_current_span(),
    );
    rx
}

/// Resolves to `true` once shutdown is signalled. Never resolves when there
/// is no shutdown channel or its sender is gone.
async fn shutdown_requested(shutdown: Option<watch::Receiver<bool>>) -> bool {
    let Some(mut rx) = shutdown else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return true;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

impl Drop for DispatchLoop {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DispatchLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchLoop")
            .field("stream_id", &self.stream_id)
            .field("state", &self.state)
            .field("consumer", &self.lease.is_some())
            .field("dispatching", &self.in_flight.is_some())
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ToolError;
    use crate::domain::models::{InputSchema, InvocationEvent, InvocationRequest, ToolOutput};
    use crate::services::capability_registry::{CapabilityRegistry, ToolHandler};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn invoke(&self, arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::Json(Value::Object(arguments.clone())))
        }
    }

    /// Sleeps, then records that it ran to the end.
    struct Slow {
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ToolHandler for Slow {
        async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(ToolOutput::text("slow done"))
        }
    }

    struct Fixture {
        queue: Arc<InvocationQueue>,
        dispatcher: Arc<Dispatcher>,
        manifest: Arc<ManifestPublisher>,
        slow_finished: Arc<AtomicBool>,
    }

    impl Fixture {
        fn new() -> Self {
            let slow_finished = Arc::new(AtomicBool::new(false));
            let registry = Arc::new(
                CapabilityRegistry::builder()
                    .register("echo", InputSchema::object(), "Echo", Arc::new(Echo))
                    .unwrap()
                    .register(
                        "slow",
                        InputSchema::object(),
                        "Slow",
                        Arc::new(Slow {
                            finished: Arc::clone(&slow_finished),
                        }),
                    )
                    .unwrap()
                    .build(),
            );
            Self {
                queue: Arc::new(InvocationQueue::new()),
                dispatcher: Arc::new(Dispatcher::new(Arc::clone(&registry))),
                manifest: Arc::new(ManifestPublisher::new(registry)),
                slow_finished,
            }
        }

        fn open(&self, interval_ms: u64, max_per_tick: usize) -> DispatchLoop {
            self.open_with_shutdown(interval_ms, max_per_tick, None)
        }

        fn open_with_shutdown(
            &self,
            interval_ms: u64,
            max_per_tick: usize,
            shutdown: Option<watch::Receiver<bool>>,
        ) -> DispatchLoop {
            let config = StreamConfig {
                heartbeat_interval_ms: interval_ms,
                max_dispatch_per_tick: max_per_tick,
            };
            DispatchLoop::new(
                Arc::clone(&self.queue),
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.manifest),
                &config,
                shutdown,
            )
        }

        fn push(&self, id: &str, tool: &str) {
            let arguments = json!({"id": id}).as_object().cloned().unwrap();
            self.queue
                .push(InvocationRequest::new(id, tool, arguments))
                .unwrap();
        }
    }

    fn message_id(frame: &Frame) -> String {
        match frame {
            Frame::Message(completed) => completed.event().id().to_string(),
            other => panic!("Expected message frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manifest_is_first_frame() {
        let fixture = Fixture::new();
        let mut stream = fixture.open(10, 1);
        assert_eq!(stream.state(), StreamState::Opened);

        let frame = stream.next_frame().await.unwrap();
        assert_eq!(frame, Frame::Manifest(fixture.manifest.build()));
        assert_eq!(stream.state(), StreamState::Streaming);
    }

    #[tokio::test]
    async fn test_idle_stream_emits_heartbeats() {
        let fixture = Fixture::new();
        let mut stream = fixture.open(5, 1);
        stream.next_frame().await.unwrap();

        for _ in 0..4 {
            assert_eq!(stream.next_frame().await, Some(Frame::Heartbeat));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_cadence_on_idle_stream() {
        let fixture = Fixture::new();
        let config = StreamConfig::default();
        let interval = Duration::from_millis(config.heartbeat_interval_ms);
        assert_eq!(interval, Duration::from_secs(1));
        let mut stream = fixture.open(config.heartbeat_interval_ms, config.max_dispatch_per_tick);
        stream.next_frame().await.unwrap();

        let started = Instant::now();
        let mut beats = Vec::new();
        while started.elapsed() < Duration::from_secs(5) {
            assert_eq!(stream.next_frame().await, Some(Frame::Heartbeat));
            beats.push(Instant::now());
        }

        assert!(beats.len() >= 4, "only {} heartbeats in 5s", beats.len());
        for pair in beats.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= interval, "heartbeat gap {gap:?} shorter than {interval:?}");
            assert!(gap < interval * 2, "heartbeat gap {gap:?} skipped a cycle");
        }
    }

    #[tokio::test]
    async fn test_dispatch_preserves_order_with_heartbeat_per_cycle() {
        let fixture = Fixture::new();
        fixture.push("a", "echo");
        fixture.push("b", "echo");

        let mut stream = fixture.open(1000, 1);
        stream.next_frame().await.unwrap();

        let mut frames = Vec::new();
        for _ in 0..4 {
            frames.push(stream.next_frame().await.unwrap());
        }
        assert_eq!(message_id(&frames[0]), "a");
        assert_eq!(frames[1], Frame::Heartbeat);
        assert_eq!(message_id(&frames[2]), "b");
        assert_eq!(frames[3], Frame::Heartbeat);

        drop(frames);
        assert_eq!(fixture.queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_batch_drain_per_cycle() {
        let fixture = Fixture::new();
        for id in ["1", "2", "3"] {
            fixture.push(id, "echo");
        }

        let mut stream = fixture.open(1000, 5);
        stream.next_frame().await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(message_id(&stream.next_frame().await.unwrap()));
        }
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(stream.next_frame().await, Some(Frame::Heartbeat));
    }

    #[tokio::test]
    async fn test_batch_dequeues_one_request_per_frame() {
        let fixture = Fixture::new();
        for id in ["a", "b", "c"] {
            fixture.push(id, "echo");
        }

        let mut first = fixture.open(1000, 3);
        first.next_frame().await.unwrap();
        let frame = first.next_frame().await.unwrap();
        assert_eq!(message_id(&frame), "a");
        drop(frame);
        drop(first);

        assert_eq!(fixture.queue.len(), 2);
        assert_eq!(fixture.queue.in_flight(), 2);

        let mut second = fixture.open(1000, 3);
        second.next_frame().await.unwrap();
        assert_eq!(message_id(&second.next_frame().await.unwrap()), "b");
        assert_eq!(message_id(&second.next_frame().await.unwrap()), "c");
        assert_eq!(second.next_frame().await, Some(Frame::Heartbeat));
        assert_eq!(fixture.queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_id_reserved_until_message_frame_dropped() {
        let fixture = Fixture::new();
        fixture.push("r", "echo");

        let mut stream = fixture.open(1000, 1);
        stream.next_frame().await.unwrap();
        let frame = stream.next_frame().await.unwrap();
        assert_eq!(message_id(&frame), "r");

        let again = InvocationRequest::new("r", "echo", Map::new());
        assert!(fixture.queue.push(again.clone()).is_err());

        drop(frame);
        assert!(fixture.queue.push(again).is_ok());
    }

    #[tokio::test]
    async fn test_closing_mid_dispatch_keeps_the_event() {
        let fixture = Fixture::new();
        fixture.push("s1", "slow");

        let mut stream = fixture.open(1000, 1);
        stream.next_frame().await.unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(50), stream.next_frame()).await;
        assert!(pending.is_err(), "slow handler should still be running");
        drop(stream);
        assert!(!fixture.queue.has_consumer());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(fixture.slow_finished.load(Ordering::SeqCst));
        assert_eq!(fixture.queue.parked(), 1);
        assert_eq!(fixture.queue.in_flight(), 1);

        let mut next = fixture.open(1000, 1);
        next.next_frame().await.unwrap();
        let frame = next.next_frame().await.unwrap();
        assert_eq!(message_id(&frame), "s1");
        assert_eq!(fixture.queue.parked(), 0);

        drop(frame);
        assert_eq!(fixture.queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_interrupted_poll_resumes_dispatch() {
        let fixture = Fixture::new();
        fixture.push("s2", "slow");

        let mut stream = fixture.open(1000, 1);
        stream.next_frame().await.unwrap();
        let pending = tokio::time::timeout(Duration::from_millis(50), stream.next_frame()).await;
        assert!(pending.is_err());

        let frame = stream.next_frame().await.unwrap();
        assert_eq!(message_id(&frame), "s2");
        assert_eq!(stream.next_frame().await, Some(Frame::Heartbeat));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_frame() {
        let fixture = Fixture::new();
        fixture.push("x", "fly");

        let mut stream = fixture.open(1000, 1);
        stream.next_frame().await.unwrap();

        match stream.next_frame().await.unwrap() {
            Frame::Message(completed) => match completed.event() {
                InvocationEvent::Error { id, error } => {
                    assert_eq!(id.to_string(), "x");
                    assert_eq!(error.code, 404);
                }
                other => panic!("Expected error event, got {other:?}"),
            },
            other => panic!("Expected message frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_push_wakes_idle_stream() {
        let fixture = Fixture::new();
        let mut stream = fixture.open(60_000, 1);
        stream.next_frame().await.unwrap();
        assert_eq!(stream.next_frame().await, Some(Frame::Heartbeat));

        let queue = Arc::clone(&fixture.queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let arguments = Map::new();
            queue
                .push(InvocationRequest::new("late", "echo", arguments))
                .unwrap();
        });

        let frame = tokio::time::timeout(Duration::from_secs(2), stream.next_frame())
            .await
            .expect("push should wake the stream before the interval elapses")
            .unwrap();
        assert_eq!(message_id(&frame), "late");
    }

    #[tokio::test]
    async fn test_single_consumer_and_handover() {
        let fixture = Fixture::new();
        let mut first = fixture.open(5, 1);
        let mut second = fixture.open(5, 1);

        first.next_frame().await.unwrap();
        first.next_frame().await.unwrap();
        second.next_frame().await.unwrap();
        second.next_frame().await.unwrap();
        assert!(first.is_consumer());
        assert!(!second.is_consumer());

        fixture.push("only", "echo");
        assert_eq!(second.next_frame().await, Some(Frame::Heartbeat));
        assert_eq!(fixture.queue.len(), 1);

        drop(first);
        assert!(!fixture.queue.has_consumer());

        let frame = second.next_frame().await.unwrap();
        assert_eq!(message_id(&frame), "only");
        assert!(second.is_consumer());
    }

    #[tokio::test]
    async fn test_shutdown_closes_stream() {
        let fixture = Fixture::new();
        let (tx, rx) = watch::channel(false);
        let mut stream = fixture.open_with_shutdown(60_000, 1, Some(rx));
        stream.next_frame().await.unwrap();
        stream.next_frame().await.unwrap();

        tx.send(true).unwrap();
        let next = tokio::time::timeout(Duration::from_secs(2), stream.next_frame())
            .await
            .unwrap();
        assert_eq!(next, None);
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(!fixture.queue.has_consumer());
    }

    #[tokio::test]
    async fn test_close_releases_lease_and_keeps_queue() {
        let fixture = Fixture::new();
        let mut stream = fixture.open(5, 1);
        stream.next_frame().await.unwrap();
        stream.next_frame().await.unwrap();
        assert!(fixture.queue.has_consumer());

        fixture.push("kept", "echo");
        stream.close();
        assert_eq!(stream.next_frame().await, None);
        assert!(!fixture.queue.has_consumer());
        assert_eq!(fixture.queue.len(), 1);
    }
}
