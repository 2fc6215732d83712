//! In-process back-end with scripted devices
//!
//! `SimulatedDriver` behaves like a vendor library: a session must be opened
//! before devices can be enumerated, every read returns raw driver units, and
//! faults can be scripted per device and per kind. It backs the demo and the
//! test-suite.

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::constants::simulated::*;
use crate::core::types::{MetricKind, PciInfo};
use crate::traits::{DeviceDriver, DeviceInfo, DriverError, RawValue};

/// One scripted device
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    name: String,
    uuid: String,
    values: HashMap<MetricKind, RawValue>,
    unsupported: HashSet<MetricKind>,
    transient: HashMap<MetricKind, u32>,
    lost_after: Option<u64>,
    reads: u64,
}

impl SimulatedDevice {
    /// A workstation card: no ECC, NVLink or MIG
    pub fn new(index: u32) -> Self {
        let bus = index + 1;
        let mut values = HashMap::new();
        values.insert(MetricKind::Clock, RawValue::Integer(CLOCK_RAW));
        values.insert(MetricKind::Temperature, RawValue::Integer(TEMPERATURE_C));
        values.insert(MetricKind::TemperatureThreshold, RawValue::Integer(TEMPERATURE_THRESHOLD_C));
        values.insert(MetricKind::MemoryTotal, RawValue::Integer(MEMORY_TOTAL_BYTES));
        values.insert(MetricKind::MemoryUsage, RawValue::Integer(MEMORY_USED_BYTES));
        values.insert(MetricKind::MemoryFree, RawValue::Integer(MEMORY_TOTAL_BYTES - MEMORY_USED_BYTES));
        values.insert(MetricKind::Utilization, RawValue::Integer(37));
        values.insert(MetricKind::MemoryUtilization, RawValue::Integer(12));
        values.insert(MetricKind::PowerDraw, RawValue::Integer(POWER_MW));
        values.insert(MetricKind::FanSpeed, RawValue::Integer(40));
        values.insert(MetricKind::ClockThrottleReason, RawValue::Integer(0x1));
        values.insert(MetricKind::PerformanceState, RawValue::Integer(2));
        values.insert(MetricKind::ProcessCount, RawValue::Integer(PROCESS_COUNT));
        values.insert(
            MetricKind::PciInfo,
            RawValue::Pci(PciInfo {
                domain: 0,
                bus,
                device: 0,
                pci_device_id: 0x2204_10de,
                bus_id: format!("00000000:{bus:02X}:00.0"),
            }),
        );

        let unsupported = [
            MetricKind::EccErrorCount,
            MetricKind::RetiredPageCount,
            MetricKind::NvLinkState,
            MetricKind::MigMode,
        ]
        .into_iter()
        .collect();

        Self {
            name: format!("Simulated GPU {index}"),
            uuid: format!("GPU-5111-0000-0000-{index:012}"),
            values,
            unsupported,
            transient: HashMap::new(),
            lost_after: None,
            reads: 0,
        }
    }

    /// A data-centre card that reports every kind
    pub fn datacenter(index: u32) -> Self {
        Self::new(index)
            .with_value(MetricKind::EccErrorCount, RawValue::Integer(0))
            .with_value(MetricKind::RetiredPageCount, RawValue::Integer(0))
            .with_value(MetricKind::NvLinkState, RawValue::Integer(12))
            .with_value(MetricKind::MigMode, RawValue::Integer(0))
            .with_name(format!("Simulated DC GPU {index}"))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the raw value reported for `kind` and marks it supported
    pub fn with_value(mut self, kind: MetricKind, value: RawValue) -> Self {
        self.unsupported.remove(&kind);
        self.values.insert(kind, value);
        self
    }

    /// Marks `kind` as unsupported
    pub fn without(mut self, kind: MetricKind) -> Self {
        self.unsupported.insert(kind);
        self
    }

    /// The next `times` reads of `kind` fail transiently
    pub fn with_transient_failures(mut self, kind: MetricKind, times: u32) -> Self {
        self.transient.insert(kind, times);
        self
    }

    /// Every read after the first `reads` reports the device as lost
    pub fn lost_after(mut self, reads: u64) -> Self {
        self.lost_after = Some(reads);
        self
    }

    fn read(&mut self, kind: MetricKind) -> Result<RawValue, DriverError> {
        self.reads += 1;
        if let Some(limit) = self.lost_after {
            if self.reads > limit {
                return Err(DriverError::DeviceLost(format!("{} is no longer reachable", self.name)));
            }
        }
        if let Some(remaining) = self.transient.get_mut(&kind) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DriverError::Transient(format!("{kind} read timed out")));
            }
        }
        if self.unsupported.contains(&kind) {
            return Err(DriverError::NotSupported);
        }
        self.values.get(&kind).cloned().ok_or(DriverError::NotSupported)
    }
}

#[derive(Debug, Default)]
struct SessionState {
    initialized: bool,
    init_count: u32,
    shutdown_count: u32,
    read_count: u64,
}

/// Scripted [`DeviceDriver`]
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    devices: Mutex<Vec<SimulatedDevice>>,
    session: Mutex<SessionState>,
    init_failure: Option<String>,
    read_delay: Option<Duration>,
}

impl SimulatedDriver {
    /// A driver with no devices
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver with `count` workstation cards
    pub fn with_devices(count: u32) -> Self {
        Self::from_devices((0..count).map(SimulatedDevice::new).collect())
    }

    pub fn from_devices(devices: Vec<SimulatedDevice>) -> Self {
        Self { devices: Mutex::new(devices), ..Self::default() }
    }

    /// `init` fails with the given message
    pub fn failing_init(mut self, message: impl Into<String>) -> Self {
        self.init_failure = Some(message.into());
        self
    }

    /// Every read blocks for `delay`, like a slow driver call
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Replaces the raw value of one device at runtime
    pub fn set_value(&self, index: u32, kind: MetricKind, value: RawValue) {
        if let Some(device) = self.devices.lock().get_mut(index as usize) {
            device.unsupported.remove(&kind);
            device.values.insert(kind, value);
        }
    }

    pub fn init_count(&self) -> u32 {
        self.session.lock().init_count
    }

    pub fn shutdown_count(&self) -> u32 {
        self.session.lock().shutdown_count
    }

    pub fn read_count(&self) -> u64 {
        self.session.lock().read_count
    }

    fn ensure_initialized(&self) -> Result<(), DriverError> {
        if self.session.lock().initialized {
            Ok(())
        } else {
            Err(DriverError::Uninitialized)
        }
    }
}

impl DeviceDriver for SimulatedDriver {
    fn name(&self) -> String {
        "simulated".to_string()
    }

    fn init(&self) -> Result<(), DriverError> {
        if let Some(message) = &self.init_failure {
            return Err(DriverError::Other(message.clone()));
        }
        let mut session = self.session.lock();
        session.initialized = true;
        session.init_count += 1;
        Ok(())
    }

    fn device_count(&self) -> Result<u32, DriverError> {
        self.ensure_initialized()?;
        Ok(self.devices.lock().len() as u32)
    }

    fn device_info(&self, index: u32) -> Result<DeviceInfo, DriverError> {
        self.ensure_initialized()?;
        let devices = self.devices.lock();
        let device = devices
            .get(index as usize)
            .ok_or_else(|| DriverError::Other(format!("no device at index {index}")))?;
        Ok(DeviceInfo {
            index,
            name: device.name.clone(),
            uuid: device.uuid.clone(),
            firmware_version: Some(FIRMWARE_VERSION.to_string()),
        })
    }

    fn read(&self, index: u32, kind: MetricKind) -> Result<RawValue, DriverError> {
        self.ensure_initialized()?;
        if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        self.session.lock().read_count += 1;
        let mut devices = self.devices.lock();
        let device = devices
            .get_mut(index as usize)
            .ok_or_else(|| DriverError::DeviceLost(format!("no device at index {index}")))?;
        device.read(kind)
    }

    fn driver_version(&self) -> Result<String, DriverError> {
        self.ensure_initialized()?;
        Ok(concat!("simulated-", env!("CARGO_PKG_VERSION")).to_string())
    }

    fn shutdown(&self) {
        let mut session = self.session.lock();
        session.initialized = false;
        session.shutdown_count += 1;
    }
}
