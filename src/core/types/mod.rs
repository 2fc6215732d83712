//! # Core Types Module
//!
//! Fundamental value types shared by the registry, sampler, collector and
//! dispatcher.
//!
//! ## Key Types
//!
//! * `DeviceHandle` - Opaque, copyable reference to an enumerated device
//! * `MetricKind` - The telemetry values a back-end can be asked for
//! * `Unit` - The unit a normalized value of a given kind is expressed in
//! * `FailurePolicy` - How strongly a device is expected to support a kind
//! * `MetricValue` - A normalized reading
//!
//! ## Example
//!
//! ```rust
//! use gpu_telemetry::core::types::{MetricKind, Unit};
//!
//! assert_eq!(MetricKind::PowerDraw.unit(), Unit::Watts);
//! assert_eq!(MetricKind::PowerDraw.unit().symbol(), "W");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier bound to a physical device when the registry enumerates it
///
/// Handles are only minted by [`crate::hardware::DeviceRegistry`] and stay
/// valid for the lifetime of that registry. They serialize for reporting but
/// cannot be rebuilt from text:
///
/// ```compile_fail
/// use gpu_telemetry::core::types::DeviceHandle;
///
/// let forged: DeviceHandle = serde_json::from_str(r#"{"ordinal":0,"index":7}"#).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceHandle {
    ordinal: u32,
    index: u32,
}

impl DeviceHandle {
    pub(crate) fn new(ordinal: u32, index: u32) -> Self {
        Self { ordinal, index }
    }

    /// Position of the device in registry order
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Index the driver uses to address the device
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu{}", self.ordinal)
    }
}

/// Telemetry values a back-end can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Graphics clock
    Clock,
    /// Core temperature
    Temperature,
    /// Frame buffer memory in use
    MemoryUsage,
    /// Total frame buffer memory
    MemoryTotal,
    /// Free frame buffer memory
    MemoryFree,
    /// Compute utilization
    Utilization,
    /// Memory controller utilization
    MemoryUtilization,
    /// Board power draw
    PowerDraw,
    /// Fan speed as a percentage of maximum
    FanSpeed,
    /// Aggregate uncorrected ECC errors
    EccErrorCount,
    /// Pages retired after ECC errors
    RetiredPageCount,
    /// Bitmask of active clock throttle reasons
    ClockThrottleReason,
    /// PCI bus descriptor
    PciInfo,
    /// Number of active NVLink links
    NvLinkState,
    /// Performance state (P0 fastest .. P15 slowest)
    PerformanceState,
    /// Multi-instance GPU mode (1 enabled, 0 disabled)
    MigMode,
    /// Slowdown temperature threshold
    TemperatureThreshold,
    /// Compute processes currently running on the device
    ProcessCount,
}

impl MetricKind {
    /// Every kind, in declaration order
    pub const ALL: [MetricKind; 18] = [
        MetricKind::Clock,
        MetricKind::Temperature,
        MetricKind::MemoryUsage,
        MetricKind::MemoryTotal,
        MetricKind::MemoryFree,
        MetricKind::Utilization,
        MetricKind::MemoryUtilization,
        MetricKind::PowerDraw,
        MetricKind::FanSpeed,
        MetricKind::EccErrorCount,
        MetricKind::RetiredPageCount,
        MetricKind::ClockThrottleReason,
        MetricKind::PciInfo,
        MetricKind::NvLinkState,
        MetricKind::PerformanceState,
        MetricKind::MigMode,
        MetricKind::TemperatureThreshold,
        MetricKind::ProcessCount,
    ];

    /// Unit of the normalized value
    pub fn unit(&self) -> Unit {
        match self {
            MetricKind::Clock => Unit::Gigahertz,
            MetricKind::Temperature | MetricKind::TemperatureThreshold => Unit::Celsius,
            MetricKind::MemoryUsage | MetricKind::MemoryTotal | MetricKind::MemoryFree => Unit::Megabytes,
            MetricKind::Utilization | MetricKind::MemoryUtilization | MetricKind::FanSpeed => Unit::Percent,
            MetricKind::PowerDraw => Unit::Watts,
            MetricKind::EccErrorCount
            | MetricKind::RetiredPageCount
            | MetricKind::NvLinkState
            | MetricKind::ProcessCount => Unit::Count,
            MetricKind::ClockThrottleReason => Unit::Bitmask,
            MetricKind::PerformanceState => Unit::PState,
            MetricKind::MigMode => Unit::Flag,
            MetricKind::PciInfo => Unit::Descriptor,
        }
    }

    /// Whether every device is expected to report this kind
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            MetricKind::Clock
            | MetricKind::Temperature
            | MetricKind::MemoryUsage
            | MetricKind::MemoryTotal
            | MetricKind::MemoryFree
            | MetricKind::Utilization
            | MetricKind::PowerDraw
            | MetricKind::PciInfo => FailurePolicy::Required,
            _ => FailurePolicy::Optional,
        }
    }

    /// Clock and temperature, the pair the diagnostics panel plots
    pub fn default_set() -> Vec<MetricKind> {
        vec![MetricKind::Clock, MetricKind::Temperature]
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Unit a normalized value is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Gigahertz,
    Celsius,
    Megabytes,
    Percent,
    Watts,
    Count,
    Bitmask,
    PState,
    Flag,
    Descriptor,
}

impl Unit {
    /// Short display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Gigahertz => "GHz",
            Unit::Celsius => "°C",
            Unit::Megabytes => "MB",
            Unit::Percent => "%",
            Unit::Watts => "W",
            Unit::Count => "",
            Unit::Bitmask => "",
            Unit::PState => "P",
            Unit::Flag => "",
            Unit::Descriptor => "",
        }
    }
}

/// How an unsupported outcome for a kind should be treated
///
/// The policy only affects how loudly the outcome is logged. A batch always
/// carries an entry for every requested kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Core telemetry; an unsupported outcome is unexpected
    Required,
    /// Feature dependent (ECC, NVLink, MIG, fans)
    Optional,
}

/// PCI location of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciInfo {
    pub domain: u32,
    pub bus: u32,
    pub device: u32,
    pub pci_device_id: u32,
    pub bus_id: String,
}

/// A normalized reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Float(f64),
    Integer(u64),
    Pci(PciInfo),
}

impl MetricValue {
    /// Numeric view of the value; `None` for structured values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float(v) => Some(*v),
            MetricValue::Integer(v) => Some(*v as f64),
            MetricValue::Pci(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetricValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Float(v) => write!(f, "{v:.3}"),
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Pci(info) => write!(f, "{}", info.bus_id),
        }
    }
}
