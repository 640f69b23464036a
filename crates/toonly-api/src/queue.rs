// Request serializer
//
// Bounded-concurrency FIFO gate in front of every thermostat API call.
// The upstream service does not tolerate interleaved requests against one
// agreement, so the default bound is a single in-flight call.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::Error;

/// Default number of calls allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Instance-scoped FIFO request queue.
///
/// Cheaply cloneable; clones share the same queue. Slots are released
/// exactly once (when the task's future completes or is dropped) and are
/// handed directly to the oldest waiter, so dispatch order always matches
/// submission order.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    limit: usize,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    in_flight: usize,
    waiting: VecDeque<oneshot::Sender<Slot>>,
    closed: bool,
}

/// A held concurrency slot. Dropping it dispatches the next waiter.
struct Slot {
    inner: Option<Arc<QueueInner>>,
}

impl RequestQueue {
    /// Create a queue that allows `limit` calls in flight (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                limit: limit.max(1),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Run `task` once a slot is available.
    ///
    /// Fails with [`Error::Aborted`] if the entry is removed by
    /// [`abort_all`](Self::abort_all) before it starts, or with
    /// [`Error::Closed`] once the queue has been closed. A task that has
    /// started always runs to completion.
    pub async fn run<F, T>(&self, task: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let _slot = self.acquire().await?;
        task.await
    }

    /// Fail every queued (not yet started) entry with [`Error::Aborted`].
    ///
    /// In-flight calls are untouched. Returns the number of entries dropped.
    pub fn abort_all(&self) -> usize {
        let drained: Vec<_> = self.inner.lock().waiting.drain(..).collect();
        let count = drained.len();
        // Dropping the senders wakes every waiter with a receive error.
        drop(drained);
        if count > 0 {
            debug!(count, "aborted queued requests");
        }
        count
    }

    /// Abort all queued entries and refuse any new ones.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.abort_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of entries waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    /// Number of calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    async fn acquire(&self) -> Result<Slot, Error> {
        let rx = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(Error::Closed);
            }
            if state.in_flight < self.inner.limit && state.waiting.is_empty() {
                state.in_flight += 1;
                return Ok(Slot {
                    inner: Some(Arc::clone(&self.inner)),
                });
            }
            let (tx, rx) = oneshot::channel();
            state.waiting.push_back(tx);
            rx
        };

        match rx.await {
            Ok(slot) => Ok(slot),
            Err(_) if self.is_closed() => Err(Error::Closed),
            Err(_) => Err(Error::Aborted),
        }
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand the released slot to the oldest live waiter, or free it.
    fn release(self: &Arc<Self>) {
        let mut state = self.lock();
        while let Some(tx) = state.waiting.pop_front() {
            let slot = Slot {
                inner: Some(Arc::clone(self)),
            };
            match tx.send(slot) {
                Ok(()) => return,
                // Waiter went away; disarm so the drop does not re-enter.
                Err(mut slot) => {
                    slot.inner = None;
                }
            }
        }
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release();
        }
    }
}
