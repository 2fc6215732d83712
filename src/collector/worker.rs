use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::config::{CollectionConfig, StopPolicy};
use crate::core::metrics::Batch;
use crate::core::types::DeviceHandle;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result, SampleError};
use crate::hardware::DeviceRegistry;
use crate::sampler::Sampler;

use super::RunOutcome;

/// Cooperative stop flag the worker can sleep on
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    requested: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub(crate) fn request(&self) {
        *self.requested.lock() = true;
        self.condvar.notify_all();
    }

    pub(crate) fn is_requested(&self) -> bool {
        *self.requested.lock()
    }

    /// Sleeps until `deadline` or a stop request; true if stop was requested
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        let mut requested = self.requested.lock();
        while !*requested {
            if self.condvar.wait_until(&mut requested, deadline).timed_out() {
                break;
            }
        }
        *requested
    }
}

/// One collection run; executes on a blocking thread
pub(crate) struct Worker {
    pub(crate) registry: Arc<DeviceRegistry>,
    pub(crate) sampler: Sampler,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) config: CollectionConfig,
    pub(crate) signal: Arc<StopSignal>,
    pub(crate) cycles: Arc<AtomicU64>,
}

impl Worker {
    pub(crate) fn run(self) -> Result<RunOutcome> {
        let handles = self.registry.handles().to_vec();
        let mut cycle = 0u64;

        loop {
            if self.signal.is_requested() {
                return Ok(RunOutcome::Stopped { cycles: cycle });
            }
            if let Some(reason) = self.registry.invalidation_reason() {
                return Err(Error::registry_invalid(reason));
            }
            if self.registry.is_released() {
                return Err(Error::registry_invalid("driver session was released"));
            }

            let started = Instant::now();
            let next = cycle + 1;
            let batch = match self.collect(next, &handles) {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    debug!(cycle = next, "cycle abandoned on stop");
                    return Ok(RunOutcome::Stopped { cycles: cycle });
                },
                Err(e) => {
                    let reason = e.to_string();
                    error!(cycle = next, %reason, "fatal device error, aborting collection");
                    self.registry.invalidate(reason.clone());
                    return Err(Error::fatal(reason));
                },
            };

            let entries = batch.len();
            let delivered = self.dispatcher.publish(batch);
            cycle = next;
            self.cycles.store(cycle, Ordering::SeqCst);
            debug!(cycle, entries, delivered, elapsed_ms = started.elapsed().as_millis() as u64, "cycle published");

            if self.config.sample_count.is_reached(cycle) {
                return Ok(RunOutcome::Completed { cycles: cycle });
            }
            if self.signal.wait_until(started + self.config.interval) {
                return Ok(RunOutcome::Stopped { cycles: cycle });
            }
        }
    }

    /// Samples every (device, kind) pair; `None` when abandoned on stop
    fn collect(&self, cycle: u64, handles: &[DeviceHandle]) -> std::result::Result<Option<Batch>, SampleError> {
        let abandon = self.config.stop_policy == StopPolicy::AbandonCycle;
        let mut batch = Batch::with_capacity(cycle, handles.len() * self.config.metric_kinds.len());

        for handle in handles {
            for kind in &self.config.metric_kinds {
                if abandon && self.signal.is_requested() {
                    return Ok(None);
                }
                let reading = self.sampler.read(*handle, *kind)?;
                batch.push(*handle, *kind, reading);
            }
        }

        batch.finish();
        Ok(Some(batch))
    }
}
