// Core modules
pub mod metrics;
pub mod types;

pub use metrics::{Batch, BatchEntry, MetricSample, Reading};
pub use types::{DeviceHandle, FailurePolicy, MetricKind, MetricValue, PciInfo, Unit};
