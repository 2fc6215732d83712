//! Periodic collection loop
//!
//! A [`Collector`] drives the sampler over every (device, kind) pair of a
//! [`DeviceRegistry`] once per cycle and hands each completed [`Batch`] to a
//! [`Dispatcher`]. The loop runs on a dedicated blocking thread so driver
//! calls never stall the async executor.
//!
//! ```text
//!            start()                stop() / sample_count reached
//!   Idle ───────────────► Running ──────────► Stopping ───► Idle
//!    ▲                       │  fatal device error            │
//!    └───────────────────────┴────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gpu_telemetry::collector::{Collector, RunOutcome};
//! use gpu_telemetry::config::{CollectionConfig, SampleCount};
//! use gpu_telemetry::dispatch::Dispatcher;
//! use gpu_telemetry::hardware::{DeviceRegistry, SimulatedDriver};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gpu_telemetry::Result<()> {
//! let registry = Arc::new(DeviceRegistry::initialize(Arc::new(SimulatedDriver::with_devices(2)))?);
//! let collector = Collector::new(registry, Dispatcher::new());
//!
//! let config = CollectionConfig::default()
//!     .with_sample_count(SampleCount::bounded(3)?)
//!     .with_interval(Duration::from_millis(10));
//! collector.start(config)?;
//! assert_eq!(collector.wait().await?, RunOutcome::Completed { cycles: 3 });
//! # Ok(())
//! # }
//! ```
//!
//! [`Batch`]: crate::core::metrics::Batch

mod worker;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::config::CollectionConfig;
use crate::constants::STOP_TIMEOUT;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::hardware::DeviceRegistry;
use crate::sampler::Sampler;

use worker::{StopSignal, Worker};

/// Lifecycle state of a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Idle,
    Running,
    Stopping,
}

impl fmt::Display for CollectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectorState::Idle => "idle",
            CollectorState::Running => "running",
            CollectorState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// How a collection run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The configured sample count was reached
    Completed { cycles: u64 },
    /// The run was stopped before reaching its sample count
    Stopped { cycles: u64 },
}

impl RunOutcome {
    /// Cycles published during the run
    pub fn cycles(&self) -> u64 {
        match self {
            RunOutcome::Completed { cycles } | RunOutcome::Stopped { cycles } => *cycles,
        }
    }
}

/// Drives periodic sampling and publishes one batch per cycle
pub struct Collector {
    registry: Arc<DeviceRegistry>,
    sampler: Sampler,
    dispatcher: Dispatcher,
    state: Arc<watch::Sender<CollectorState>>,
    cycles: Arc<AtomicU64>,
    signal: Mutex<Option<Arc<StopSignal>>>,
    worker: Mutex<Option<JoinHandle<Result<RunOutcome>>>>,
}

impl Collector {
    pub fn new(registry: Arc<DeviceRegistry>, dispatcher: Dispatcher) -> Self {
        let sampler = Sampler::new(Arc::clone(registry.driver()));
        let (state, _) = watch::channel(CollectorState::Idle);
        Self {
            registry,
            sampler,
            dispatcher,
            state: Arc::new(state),
            cycles: Arc::new(AtomicU64::new(0)),
            signal: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> CollectorState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<CollectorState> {
        self.state.subscribe()
    }

    /// Cycles published by the current (or last) run
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Starts a collection run on a dedicated blocking thread
    ///
    /// Requires the collector to be idle, the registry to be valid and a
    /// tokio runtime. Cycle numbering starts at 1 for every run.
    #[instrument(skip_all, fields(devices = self.registry.count(), kinds = config.metric_kinds.len()))]
    pub fn start(&self, config: CollectionConfig) -> Result<()> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::collector("a tokio runtime is required to start collection"))?;

        let mut worker = self.worker.lock();
        if self.state() != CollectorState::Idle {
            return Err(Error::AlreadyRunning);
        }
        if let Some(reason) = self.registry.invalidation_reason() {
            return Err(Error::registry_invalid(reason));
        }
        if self.registry.is_released() {
            return Err(Error::registry_invalid("driver session was released"));
        }

        let signal = Arc::new(StopSignal::default());
        *self.signal.lock() = Some(Arc::clone(&signal));
        self.cycles.store(0, Ordering::SeqCst);
        self.state.send_replace(CollectorState::Running);

        info!(
            interval_ms = config.interval.as_millis() as u64,
            sample_count = ?config.sample_count.limit(),
            "collection started"
        );

        let run = Worker {
            registry: Arc::clone(&self.registry),
            sampler: self.sampler.clone(),
            dispatcher: self.dispatcher.clone(),
            config,
            signal,
            cycles: Arc::clone(&self.cycles),
        };
        let state = Arc::clone(&self.state);
        // A previous run that finished without being reaped is detached here
        *worker = Some(runtime.spawn_blocking(move || {
            let _idle = scopeguard::guard(state, |state| {
                state.send_replace(CollectorState::Idle);
            });
            let result = run.run();
            match &result {
                Ok(outcome) => info!(?outcome, "collection finished"),
                Err(e) => error!(error = %e, "collection aborted"),
            }
            result
        }));

        Ok(())
    }

    /// Requests a cooperative stop and waits for the worker to exit
    ///
    /// Returns the run's outcome; a fatal error during the run is returned
    /// as `Err`. If the worker does not exit within [`STOP_TIMEOUT`] the
    /// call fails with [`Error::Collector`] and the worker is left to finish
    /// in the background.
    #[instrument(skip_all)]
    pub async fn stop(&self) -> Result<RunOutcome> {
        let handle = self.worker.lock().take();
        let Some(handle) = handle else {
            if self.state() == CollectorState::Idle {
                return Err(Error::NotRunning);
            }
            // Another caller is reaping the worker through `wait`
            self.request_stop();
            let mut state = self.watch_state();
            tokio::time::timeout(STOP_TIMEOUT, state.wait_for(|s| *s == CollectorState::Idle))
                .await
                .map_err(|_| Error::collector("timed out waiting for the collection worker to stop"))?
                .map_err(|_| Error::collector("collector state channel closed"))?;
            return Ok(RunOutcome::Stopped { cycles: self.cycles_completed() });
        };

        self.request_stop();
        Self::reap(handle, Some(STOP_TIMEOUT)).await
    }

    /// Waits for the current run to end on its own
    pub async fn wait(&self) -> Result<RunOutcome> {
        let handle = self.worker.lock().take().ok_or(Error::NotRunning)?;
        Self::reap(handle, None).await
    }

    fn request_stop(&self) {
        if let Some(signal) = self.signal.lock().as_ref() {
            signal.request();
        }
        self.state.send_if_modified(|state| {
            if *state == CollectorState::Running {
                *state = CollectorState::Stopping;
                true
            } else {
                false
            }
        });
    }

    async fn reap(handle: JoinHandle<Result<RunOutcome>>, timeout: Option<Duration>) -> Result<RunOutcome> {
        let joined = match timeout {
            Some(limit) => tokio::time::timeout(limit, handle)
                .await
                .map_err(|_| Error::collector("timed out waiting for the collection worker to stop"))?,
            None => handle.await,
        };
        joined.map_err(|e| Error::collector(format!("collection worker panicked: {e}")))?
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        // Can't await here; the worker exits at its next check
        if let Some(signal) = self.signal.lock().take() {
            signal.request();
        }
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("state", &self.state())
            .field("cycles_completed", &self.cycles_completed())
            .field("registry", &self.registry)
            .finish()
    }
}
