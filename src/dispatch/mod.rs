//! Batch fan-out to subscribers
//!
//! The [`Dispatcher`] is the only coupling between the collector and its
//! consumers. Every subscriber gets its own bounded queue, so a stalled
//! consumer only loses its own batches (per [`OverflowPolicy`]) and never
//! delays the collector or the other subscribers.
//!
//! ```rust
//! use gpu_telemetry::core::metrics::Batch;
//! use gpu_telemetry::dispatch::Dispatcher;
//!
//! let dispatcher = Dispatcher::new();
//! let mut subscription = dispatcher.subscribe();
//! dispatcher.publish(Batch::new(1));
//! assert_eq!(subscription.try_recv().unwrap().cycle, 1);
//! ```
//!
//! [`OverflowPolicy`]: crate::config::OverflowPolicy

mod queue;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

pub use queue::{Subscription, SubscriptionId};
use queue::{PushOutcome, SubscriberQueue};

use crate::config::DispatcherConfig;
use crate::core::metrics::Batch;
use crate::error::Result;
use crate::traits::BatchSink;

struct Inner {
    config: DispatcherConfig,
    // Copy-on-write snapshot; publish never holds the lock while pushing
    subscribers: RwLock<Arc<Vec<Arc<SubscriberQueue>>>>,
    next_id: AtomicU64,
    published: AtomicU64,
    closed: AtomicBool,
}

/// Delivers each published batch to every current subscriber
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with depth-1, drop-oldest queues
    pub fn new() -> Self {
        Self::build(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                subscribers: RwLock::new(Arc::new(Vec::new())),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> DispatcherConfig {
        self.inner.config
    }

    /// Registers a new subscriber
    ///
    /// The subscriber only sees batches published after this call. On a
    /// closed dispatcher the returned subscription is already finished.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let queue = Arc::new(SubscriberQueue::new(id, self.inner.config.queue_depth, self.inner.config.overflow));

        let mut guard = self.inner.subscribers.write();
        // `close` sets the flag before taking this lock, so checking under it
        // means either we see the flag or `close` sees our queue
        if self.inner.closed.load(Ordering::Acquire) {
            drop(guard);
            queue.close();
            return Subscription::new(queue);
        }
        let mut next: Vec<_> = guard.iter().filter(|q| !q.is_closed()).cloned().collect();
        next.push(Arc::clone(&queue));
        *guard = Arc::new(next);
        drop(guard);

        debug!(subscription = %id, "subscriber added");
        Subscription::new(queue)
    }

    /// Removes a subscriber; returns `false` if it was not registered
    ///
    /// Batches published afterwards are never delivered to it. Batches
    /// already queued can still be drained before `recv` returns `None`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self.inner.subscribers.write();
        let Some(queue) = guard.iter().find(|q| q.id() == id).cloned() else {
            return false;
        };
        let next: Vec<_> = guard.iter().filter(|q| q.id() != id && !q.is_closed()).cloned().collect();
        *guard = Arc::new(next);
        drop(guard);

        queue.close();
        debug!(subscription = %id, "subscriber removed");
        true
    }

    /// Hands `batch` to every subscriber without blocking
    ///
    /// Returns how many subscriber queues accepted it.
    pub fn publish(&self, batch: impl Into<Arc<Batch>>) -> usize {
        let batch = batch.into();
        let snapshot = self.inner.subscribers.read().clone();
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut accepted = 0;
        for queue in snapshot.iter() {
            match queue.push(Arc::clone(&batch)) {
                PushOutcome::Queued => accepted += 1,
                PushOutcome::Evicted => {
                    accepted += 1;
                    debug!(subscription = %queue.id(), cycle = batch.cycle, "evicted oldest batch");
                },
                PushOutcome::Rejected => {
                    debug!(subscription = %queue.id(), cycle = batch.cycle, "subscriber queue full, batch dropped");
                },
                PushOutcome::Closed => {},
            }
        }
        accepted
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().iter().filter(|q| !q.is_closed()).count()
    }

    /// Batches published since creation
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Ends every subscription; later subscriptions start out finished
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscribers = std::mem::take(&mut *self.inner.subscribers.write());
        for queue in subscribers.iter() {
            queue.close();
        }
        debug!(count = subscribers.len(), "dispatcher closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Subscribes `sink` and forwards batches to it on a tokio task
    ///
    /// The task ends after [`BatchSink::on_close`] once the subscription is
    /// removed or the dispatcher closes. Must be called inside a runtime.
    pub fn spawn_sink<S>(&self, sink: Arc<S>) -> (SubscriptionId, JoinHandle<()>)
    where
        S: BatchSink + ?Sized,
    {
        let mut subscription = self.subscribe();
        let id = subscription.id();
        let handle = tokio::spawn(async move {
            while let Some(batch) = subscription.recv().await {
                sink.on_batch(batch).await;
            }
            sink.on_close().await;
        });
        (id, handle)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published())
            .field("closed", &self.is_closed())
            .finish()
    }
}
