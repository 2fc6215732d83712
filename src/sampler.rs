//! Single-metric reads and unit normalization
//!
//! The sampler turns one raw driver read into a [`MetricSample`]. Each call
//! is independent; an unsupported metric is reported as
//! [`SampleError::Unsupported`] and never panics or unwinds.
//!
//! Normalization rules:
//!
//! | Kind                                 | Rule              |
//! |--------------------------------------|-------------------|
//! | `PowerDraw`                          | mW ÷ 1000 → W     |
//! | `Clock`                              | raw ÷ 1000        |
//! | `MemoryUsage/MemoryTotal/MemoryFree` | bytes ÷ 1024² → MB|
//! | `Temperature/TemperatureThreshold`   | unmodified °C     |
//! | everything else                      | unmodified        |

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::constants::units::{BYTES_PER_MB, CLOCK_DIVISOR, MILLIWATTS_PER_WATT};
use crate::core::metrics::{MetricSample, Reading};
use crate::core::types::{DeviceHandle, FailurePolicy, MetricKind, MetricValue};
use crate::error::SampleError;
use crate::traits::{DeviceDriver, RawValue};

/// Converts a milliwatt reading to watts
pub fn milliwatts_to_watts(milliwatts: f64) -> f64 {
    milliwatts / MILLIWATTS_PER_WATT
}

/// Scales a raw clock reading for display
pub fn scale_clock(raw: f64) -> f64 {
    raw / CLOCK_DIVISOR
}

/// Converts bytes to megabytes (1024²)
pub fn bytes_to_megabytes(bytes: f64) -> f64 {
    bytes / BYTES_PER_MB
}

fn raw_as_f64(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Integer(v) => Some(*v as f64),
        RawValue::Float(v) => Some(*v),
        RawValue::Pci(_) => None,
    }
}

/// Applies the normalization rule for `kind` to a raw driver value
pub fn normalize(kind: MetricKind, raw: RawValue) -> Result<MetricValue, SampleError> {
    let mismatch = || SampleError::transient(format!("driver returned an unexpected value shape for {kind}"));

    let value = match kind {
        MetricKind::PowerDraw => MetricValue::Float(milliwatts_to_watts(raw_as_f64(&raw).ok_or_else(mismatch)?)),
        MetricKind::Clock => MetricValue::Float(scale_clock(raw_as_f64(&raw).ok_or_else(mismatch)?)),
        MetricKind::MemoryUsage | MetricKind::MemoryTotal | MetricKind::MemoryFree => {
            MetricValue::Float(bytes_to_megabytes(raw_as_f64(&raw).ok_or_else(mismatch)?))
        },
        MetricKind::Temperature | MetricKind::TemperatureThreshold => {
            MetricValue::Float(raw_as_f64(&raw).ok_or_else(mismatch)?)
        },
        MetricKind::PciInfo => match raw {
            RawValue::Pci(info) => MetricValue::Pci(info),
            _ => return Err(mismatch()),
        },
        _ => match raw {
            RawValue::Integer(v) => MetricValue::Integer(v),
            RawValue::Float(v) => MetricValue::Float(v),
            RawValue::Pci(_) => return Err(mismatch()),
        },
    };
    Ok(value)
}

/// Reads individual metrics from a driver
#[derive(Clone)]
pub struct Sampler {
    driver: Arc<dyn DeviceDriver>,
}

impl Sampler {
    pub fn new(driver: Arc<dyn DeviceDriver>) -> Self {
        Self { driver }
    }

    /// Reads and normalizes one metric of one device
    pub fn sample(&self, handle: DeviceHandle, kind: MetricKind) -> Result<MetricSample, SampleError> {
        let raw = self.driver.read(handle.index(), kind).map_err(|e| e.into_sample_error(kind))?;
        let value = normalize(kind, raw)?;
        trace!(device = %handle, %kind, %value, "sampled");
        Ok(MetricSample::new(handle, kind, value))
    }

    /// Samples one (device, kind) pair into a batch reading
    ///
    /// Unsupported and transient outcomes become readings; only a fatal
    /// error is returned as `Err`.
    pub fn read(&self, handle: DeviceHandle, kind: MetricKind) -> Result<Reading, SampleError> {
        match self.sample(handle, kind) {
            Ok(sample) => Ok(Reading::Value(sample)),
            Err(SampleError::Unsupported(_)) => {
                match kind.failure_policy() {
                    FailurePolicy::Required => warn!(device = %handle, %kind, "required metric unsupported"),
                    FailurePolicy::Optional => debug!(device = %handle, %kind, "metric unsupported"),
                }
                Ok(Reading::Unsupported)
            },
            Err(SampleError::Transient(reason)) => {
                debug!(device = %handle, %kind, %reason, "transient read failure");
                Ok(Reading::Failed(reason))
            },
            Err(fatal) => Err(fatal),
        }
    }

    /// Samples every kind of one device, in order
    pub fn sample_all(&self, handle: DeviceHandle, kinds: &[MetricKind]) -> Result<Vec<Reading>, SampleError> {
        kinds.iter().map(|kind| self.read(handle, *kind)).collect()
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler").field("driver", &self.driver.name()).finish()
    }
}
