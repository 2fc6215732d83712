use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

use crate::config::OverflowPolicy;
use crate::core::metrics::Batch;

/// Identifies one subscription on a dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest entry
    Evicted,
    /// The incoming batch was discarded
    Rejected,
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    batches: VecDeque<Arc<Batch>>,
    closed: bool,
    dropped: u64,
}

/// Bounded per-subscriber queue
#[derive(Debug)]
pub(crate) struct SubscriberQueue {
    id: SubscriptionId,
    depth: usize,
    overflow: OverflowPolicy,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl SubscriberQueue {
    pub(crate) fn new(id: SubscriptionId, depth: usize, overflow: OverflowPolicy) -> Self {
        Self { id, depth, overflow, state: Mutex::new(QueueState::default()), notify: Notify::new() }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Never blocks; applies the overflow policy when full
    pub(crate) fn push(&self, batch: Arc<Batch>) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            if state.batches.len() < self.depth {
                state.batches.push_back(batch);
                PushOutcome::Queued
            } else {
                state.dropped += 1;
                match self.overflow {
                    OverflowPolicy::DropOldest => {
                        state.batches.pop_front();
                        state.batches.push_back(batch);
                        PushOutcome::Evicted
                    },
                    OverflowPolicy::DropNewest => PushOutcome::Rejected,
                }
            }
        };
        if outcome != PushOutcome::Rejected {
            self.notify.notify_one();
        }
        outcome
    }

    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Receiving end of a dispatcher subscription
///
/// Dropping the subscription closes its queue; the dispatcher stops
/// delivering to it on the next publish.
#[derive(Debug)]
pub struct Subscription {
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub(crate) fn new(queue: Arc<SubscriberQueue>) -> Self {
        Self { queue }
    }

    pub fn id(&self) -> SubscriptionId {
        self.queue.id()
    }

    /// Waits for the next batch
    ///
    /// Returns `None` once the subscription was removed or the dispatcher
    /// closed and every queued batch has been taken.
    pub async fn recv(&mut self) -> Option<Arc<Batch>> {
        loop {
            let notified = self.queue.notify.notified();
            {
                let mut state = self.queue.state.lock();
                if let Some(batch) = state.batches.pop_front() {
                    return Some(batch);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Takes a queued batch without waiting
    pub fn try_recv(&mut self) -> Option<Arc<Batch>> {
        self.queue.state.lock().batches.pop_front()
    }

    /// Batches lost to the overflow policy so far
    pub fn dropped(&self) -> u64 {
        self.queue.state.lock().dropped
    }

    /// Batches waiting to be received
    pub fn pending(&self) -> usize {
        self.queue.state.lock().batches.len()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Adapts the subscription into a stream of batches
    pub fn into_stream(self) -> impl Stream<Item = Arc<Batch>> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|batch| (batch, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.close();
    }
}
