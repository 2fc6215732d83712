use serde::Serialize;

use crate::core::types::{MetricKind, PciInfo};
use crate::error::{InitError, SampleError};

#[cfg(test)]
use mockall::automock;

/// Descriptive data captured once when a device is enumerated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Index the driver addresses the device by
    pub index: u32,
    /// Marketing name, e.g. "NVIDIA A100-SXM4-40GB"
    pub name: String,
    /// Stable identifier reported by the driver
    pub uuid: String,
    /// VBIOS version, when the driver exposes it
    pub firmware_version: Option<String>,
}

/// A value in the driver's native units, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(u64),
    Float(f64),
    Pci(PciInfo),
}

/// Typed failure reported by a driver call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("not supported")]
    NotSupported,

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("device lost: {0}")]
    DeviceLost(String),

    #[error("driver not initialized")]
    Uninitialized,

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Classifies a failed read of `kind`
    pub fn into_sample_error(self, kind: MetricKind) -> SampleError {
        match self {
            DriverError::NotSupported => SampleError::Unsupported(kind),
            DriverError::Transient(msg) | DriverError::Other(msg) => SampleError::Transient(msg),
            DriverError::DeviceLost(msg) => SampleError::Fatal(msg),
            DriverError::Uninitialized => SampleError::fatal("driver session is not initialized"),
        }
    }

    pub(crate) fn into_init_error(self) -> InitError {
        match self {
            DriverError::Uninitialized => InitError::DriverUnavailable("driver session is not initialized".into()),
            other => InitError::Enumeration(other.to_string()),
        }
    }
}

/// Capability interface a vendor back-end implements
///
/// `init` and `shutdown` bracket a driver session and are called exactly once
/// each by [`crate::hardware::DeviceRegistry`]. Reads are issued sequentially
/// from a single worker, never concurrently.
#[cfg_attr(test, automock)]
pub trait DeviceDriver: Send + Sync + 'static {
    /// Short back-end name used in logs
    fn name(&self) -> String;

    /// Opens the driver session
    fn init(&self) -> Result<(), DriverError>;

    /// Number of devices visible to the session
    fn device_count(&self) -> Result<u32, DriverError>;

    /// Acquires the device at `index` and describes it
    fn device_info(&self, index: u32) -> Result<DeviceInfo, DriverError>;

    /// Reads one metric in native units
    fn read(&self, index: u32, kind: MetricKind) -> Result<RawValue, DriverError>;

    /// Version string of the installed driver
    fn driver_version(&self) -> Result<String, DriverError>;

    /// Closes the driver session
    fn shutdown(&self);
}
