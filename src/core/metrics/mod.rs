//! # Core Metrics Module
//!
//! Samples, per-pair readings and the per-cycle batch handed to subscribers.
//!
//! ## Example
//!
//! ```rust
//! use gpu_telemetry::core::metrics::{Batch, Reading};
//!
//! let batch = Batch::new(1);
//! assert!(batch.is_empty());
//! assert_eq!(batch.cycle, 1);
//! ```
use std::time::SystemTime;

use serde::Serialize;

use crate::core::types::{DeviceHandle, MetricKind, MetricValue, Unit};

/// A single normalized measurement with the time it was taken
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// What was measured
    pub kind: MetricKind,
    /// The normalized value
    pub value: MetricValue,
    /// When the read completed
    pub timestamp: SystemTime,
    /// The device it was read from
    pub device: DeviceHandle,
}

impl MetricSample {
    /// Creates a new sample with the current time as timestamp
    pub fn new(device: DeviceHandle, kind: MetricKind, value: MetricValue) -> Self {
        Self::with_timestamp(device, kind, value, SystemTime::now())
    }

    /// Creates a new sample with a specific timestamp
    pub fn with_timestamp(device: DeviceHandle, kind: MetricKind, value: MetricValue, timestamp: SystemTime) -> Self {
        Self { kind, value, timestamp, device }
    }

    pub fn unit(&self) -> Unit {
        self.kind.unit()
    }
}

/// Outcome of one (device, kind) pair within a cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Reading {
    /// The read succeeded
    Value(MetricSample),
    /// The device cannot provide this kind; distinct from a zero value
    Unsupported,
    /// The read failed this cycle and will be retried on the next one
    Failed(String),
}

impl Reading {
    pub fn sample(&self) -> Option<&MetricSample> {
        match self {
            Reading::Value(sample) => Some(sample),
            _ => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Reading::Unsupported)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Reading::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub device: DeviceHandle,
    pub kind: MetricKind,
    pub reading: Reading,
}

/// The ordered result of one collection cycle
///
/// Entries are in (device, kind) order: registry order across devices and
/// configuration order across kinds within a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    /// 1-based cycle number within the collection run
    pub cycle: u64,
    /// When the cycle started
    pub started_at: SystemTime,
    /// When the last entry was recorded
    pub finished_at: SystemTime,
    pub entries: Vec<BatchEntry>,
}

impl Batch {
    /// Creates an empty batch for the given cycle
    pub fn new(cycle: u64) -> Self {
        let now = SystemTime::now();
        Self { cycle, started_at: now, finished_at: now, entries: Vec::new() }
    }

    pub(crate) fn with_capacity(cycle: u64, capacity: usize) -> Self {
        let mut batch = Self::new(cycle);
        batch.entries.reserve_exact(capacity);
        batch
    }

    pub(crate) fn push(&mut self, device: DeviceHandle, kind: MetricKind, reading: Reading) {
        self.entries.push(BatchEntry { device, kind, reading });
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = SystemTime::now();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the reading for a (device, kind) pair
    pub fn get(&self, device: DeviceHandle, kind: MetricKind) -> Option<&Reading> {
        self.entries.iter().find(|e| e.device == device && e.kind == kind).map(|e| &e.reading)
    }

    /// All successful samples, in batch order
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.entries.iter().filter_map(|e| e.reading.sample())
    }

    /// Pairs the device could not provide
    pub fn unsupported(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.reading.is_unsupported())
    }

    /// Pairs whose read failed this cycle
    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.reading.is_failed())
    }

    /// Entries belonging to one device
    pub fn for_device(&self, device: DeviceHandle) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(move |e| e.device == device)
    }
}
