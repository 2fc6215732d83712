//! GPU Telemetry - periodic accelerator telemetry with asynchronous fan-out
//!
//! This crate polls a vendor device-management library for per-device
//! metrics (clocks, temperatures, memory, utilization, power, fans, ECC
//! counters, PCI identity and more), normalizes them into display units and
//! hands one consistent [`Batch`](crate::core::metrics::Batch) per cycle to any
//! number of independent subscribers.
//!
//! # Architecture
//!
//! - [`traits::DeviceDriver`]: capability interface over the vendor library
//! - [`hardware::DeviceRegistry`]: owns the driver session and the device handles
//! - [`sampler::Sampler`]: one metric of one device, normalized
//! - [`collector::Collector`]: the periodic loop on a dedicated worker
//! - [`dispatch::Dispatcher`]: bounded per-subscriber queues
//!
//! Unsupported metrics are first-class outcomes: they show up as
//! [`Reading::Unsupported`](crate::core::metrics::Reading) in the batch rather than
//! as zeros or errors.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gpu_telemetry::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let driver = Arc::new(SimulatedDriver::with_devices(2));
//! let registry = Arc::new(DeviceRegistry::initialize(driver)?);
//! let dispatcher = Dispatcher::with_config(DispatcherConfig::default().with_queue_depth(8))?;
//! let mut batches = dispatcher.subscribe();
//!
//! let collector = Collector::new(registry, dispatcher);
//! let config = CollectionConfig::new([MetricKind::PowerDraw, MetricKind::Clock])
//!     .with_sample_count(SampleCount::bounded(2)?)
//!     .with_interval(Duration::from_millis(10));
//! collector.start(config)?;
//!
//! assert_eq!(collector.wait().await?, RunOutcome::Completed { cycles: 2 });
//!
//! while let Some(batch) = batches.try_recv() {
//!     println!("cycle {}: {} readings", batch.cycle, batch.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Back-ends
//!
//! The in-process [`SimulatedDriver`](hardware::SimulatedDriver) is always
//! available. The NVIDIA back-end is behind the `nvml` cargo feature and
//! loads `libnvidia-ml` at runtime.
//!
//! # Logging
//!
//! Every component emits `tracing` events. Hosts that do not install their
//! own subscriber can call [`logging::init_tracing`].

#![doc(html_root_url = "https://docs.rs/gpu-telemetry/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod collector;
pub mod config;
pub mod constants;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod sampler;
pub mod traits;

pub use error::{Error, InitError, Result, SampleError};

pub mod prelude {
    pub use crate::collector::{Collector, CollectorState, RunOutcome};
    pub use crate::config::{CollectionConfig, DispatcherConfig, OverflowPolicy, SampleCount, StopPolicy};
    pub use crate::core::metrics::{Batch, BatchEntry, MetricSample, Reading};
    pub use crate::core::types::{DeviceHandle, MetricKind, MetricValue, PciInfo, Unit};
    pub use crate::dispatch::{Dispatcher, Subscription, SubscriptionId};
    pub use crate::error::{Error, InitError, Result, SampleError};
    pub use crate::hardware::{DeviceRegistry, SimulatedDevice, SimulatedDriver};
    pub use crate::sampler::Sampler;
    pub use crate::traits::{BatchSink, DeviceDriver, DeviceInfo, DriverError, RawValue};

    #[cfg(feature = "nvml")]
    pub use crate::hardware::NvmlDriver;
}
