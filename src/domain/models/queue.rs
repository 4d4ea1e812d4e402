//! Invocation queue and the guards that track in-flight ids.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use super::invocation::{CorrelationId, InvocationEvent, InvocationRequest};

/// Rejection returned by [`InvocationQueue::push`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The id belongs to a request whose event has not been delivered yet.
    #[error("request id {0} is already in flight")]
    DuplicateId(CorrelationId),
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<InvocationRequest>,
    /// Events that finished after their stream went away, oldest first.
    parked: VecDeque<InvocationEvent>,
    /// Keys of ids that are queued, being dispatched, or awaiting delivery.
    in_flight: HashSet<String>,
    consumer_attached: bool,
}

/// Unbounded FIFO hand-off between the intake endpoint and the dispatch loop.
///
/// Any number of producers may [`push`](Self::push) concurrently. Consumption
/// goes through a [`ConsumerLease`], of which at most one exists at a time,
/// so requests are never split across competing consumers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use deskbridge::domain::models::{InvocationQueue, InvocationRequest};
///
/// let queue = Arc::new(InvocationQueue::new());
/// queue.push(InvocationRequest::new("a", "click", Default::default())).unwrap();
/// queue.push(InvocationRequest::new("b", "click", Default::default())).unwrap();
///
/// let lease = queue.try_acquire_consumer().unwrap();
/// assert!(queue.try_acquire_consumer().is_none());
///
/// let first = lease.try_pop().unwrap();
/// assert_eq!(first.request().id.to_string(), "a");
/// ```
#[derive(Debug, Default)]
pub struct InvocationQueue {
    state: Mutex<QueueState>,
    pushed: Notify,
}

impl InvocationQueue {
    /// Create an empty queue with no consumer attached.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a request. Never blocks beyond the short critical section.
    ///
    /// Fails when a request with the same id is still queued, being
    /// dispatched, or waiting for its event to be delivered; nothing is
    /// enqueued in that case.
    pub fn push(&self, request: InvocationRequest) -> Result<(), QueueError> {
        {
            let mut state = self.state();
            if !state.in_flight.insert(request.id.key()) {
                return Err(QueueError::DuplicateId(request.id));
            }
            state.items.push_back(request);
        }
        self.pushed.notify_waiters();
        Ok(())
    }

    /// Take the consumer role if no other stream holds it.
    pub fn try_acquire_consumer(self: &Arc<Self>) -> Option<ConsumerLease> {
        let mut state = self.state();
        if state.consumer_attached {
            return None;
        }
        state.consumer_attached = true;
        Some(ConsumerLease {
            queue: Arc::clone(self),
        })
    }

    /// Resolves on the next push, parked event, or lease release.
    pub fn notified(&self) -> Notified<'_> {
        self.pushed.notified()
    }

    /// Number of requests waiting to be dispatched.
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    /// Whether no request is waiting to be dispatched.
    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    /// Number of finished events waiting for a stream.
    pub fn parked(&self) -> usize {
        self.state().parked.len()
    }

    /// Whether a consumer has anything to emit: a parked event or a request.
    pub fn has_work(&self) -> bool {
        let state = self.state();
        !state.parked.is_empty() || !state.items.is_empty()
    }

    /// Number of ids whose event has not been delivered yet.
    pub fn in_flight(&self) -> usize {
        self.state().in_flight.len()
    }

    /// Whether some stream holds the consumer role.
    pub fn has_consumer(&self) -> bool {
        self.state().consumer_attached
    }

    fn reserve(self: &Arc<Self>, key: String) -> Reservation {
        Reservation {
            queue: Arc::clone(self),
            key,
            held: true,
        }
    }
}

/// Exclusive right to consume an [`InvocationQueue`].
///
/// Dropping the lease (for example when its stream closes) frees the
/// consumer role for the next stream.
#[derive(Debug)]
pub struct ConsumerLease {
    queue: Arc<InvocationQueue>,
}

impl ConsumerLease {
    /// Non-blocking poll for the oldest queued request.
    pub fn try_pop(&self) -> Option<Claimed> {
        let request = self.queue.state().items.pop_front()?;
        let reservation = self.queue.reserve(request.id.key());
        Some(Claimed {
            request,
            reservation,
        })
    }

    /// Non-blocking poll for the oldest event left behind by a closed stream.
    pub fn try_take_parked(&self) -> Option<Completed> {
        let event = self.queue.state().parked.pop_front()?;
        let reservation = self.queue.reserve(event.id().key());
        Some(Completed { event, reservation })
    }
}

impl Drop for ConsumerLease {
    fn drop(&mut self) {
        self.queue.state().consumer_attached = false;
        self.queue.pushed.notify_waiters();
    }
}

/// Keeps an id in the in-flight set until dropped.
#[derive(Debug)]
struct Reservation {
    queue: Arc<InvocationQueue>,
    key: String,
    held: bool,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.held {
            self.queue.state().in_flight.remove(&self.key);
        }
    }
}

/// A dequeued request whose id stays reserved until this value is dropped.
#[derive(Debug)]
pub struct Claimed {
    request: InvocationRequest,
    reservation: Reservation,
}

impl Claimed {
    /// The dequeued request.
    pub fn request(&self) -> &InvocationRequest {
        &self.request
    }

    /// Attach the request's event. The id stays reserved until the
    /// returned value is dropped.
    pub fn complete(self, event: InvocationEvent) -> Completed {
        Completed {
            event,
            reservation: self.reservation,
        }
    }
}

/// A finished event whose id stays reserved until it is dropped, which the
/// dispatch loop does only after handing the event to its stream.
#[derive(Debug)]
pub struct Completed {
    event: InvocationEvent,
    reservation: Reservation,
}

impl Completed {
    /// The event to emit.
    pub fn event(&self) -> &InvocationEvent {
        &self.event
    }

    /// Return an undelivered event to the queue for the next consumer.
    pub fn park(self) {
        let Self {
            event,
            mut reservation,
        } = self;
        reservation.held = false;
        reservation.queue.state().parked.push_back(event);
        reservation.queue.pushed.notify_waiters();
    }
}

impl PartialEq for Completed {
    fn eq(&self, other: &Self) -> bool {
        self.event == other.event
    }
}
