//! NVIDIA back-end built on `nvml-wrapper`
//!
//! The NVML session is opened in `init` and closed in `shutdown`. Devices are
//! re-acquired by index for every read so no borrowed NVML handle outlives a
//! call.

use nvml_wrapper::enum_wrappers::device::{
    Clock, EccCounter, MemoryError, PerformanceState, RetirementCause, TemperatureSensor, TemperatureThreshold,
};
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use parking_lot::RwLock;
use tracing::warn;

use crate::core::types::{MetricKind, PciInfo};
use crate::traits::{DeviceDriver, DeviceInfo, DriverError, RawValue};

/// Highest NVLink count NVML reports on current hardware
const NVLINK_MAX_LINKS: u32 = 18;

#[derive(Default)]
pub struct NvmlDriver {
    nvml: RwLock<Option<Nvml>>,
}

impl NvmlDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_nvml<T>(&self, f: impl FnOnce(&Nvml) -> Result<T, NvmlError>) -> Result<T, DriverError> {
        let guard = self.nvml.read();
        let nvml = guard.as_ref().ok_or(DriverError::Uninitialized)?;
        f(nvml).map_err(map_nvml_error)
    }
}

fn map_nvml_error(error: NvmlError) -> DriverError {
    match error {
        NvmlError::NotSupported | NvmlError::FunctionNotFound => DriverError::NotSupported,
        NvmlError::GpuLost | NvmlError::InvalidArg => DriverError::DeviceLost(error.to_string()),
        NvmlError::Uninitialized => DriverError::Uninitialized,
        NvmlError::Timeout | NvmlError::InsufficientSize(_) => DriverError::Transient(error.to_string()),
        other => DriverError::Other(other.to_string()),
    }
}

fn performance_state_index(state: PerformanceState) -> Result<u64, NvmlError> {
    let index = match state {
        PerformanceState::Zero => 0,
        PerformanceState::One => 1,
        PerformanceState::Two => 2,
        PerformanceState::Three => 3,
        PerformanceState::Four => 4,
        PerformanceState::Five => 5,
        PerformanceState::Six => 6,
        PerformanceState::Seven => 7,
        PerformanceState::Eight => 8,
        PerformanceState::Nine => 9,
        PerformanceState::Ten => 10,
        PerformanceState::Eleven => 11,
        PerformanceState::Twelve => 12,
        PerformanceState::Thirteen => 13,
        PerformanceState::Fourteen => 14,
        PerformanceState::Fifteen => 15,
        PerformanceState::Unknown => return Err(NvmlError::NotSupported),
    };
    Ok(index)
}

impl DeviceDriver for NvmlDriver {
    fn name(&self) -> String {
        "nvml".to_string()
    }

    fn init(&self) -> Result<(), DriverError> {
        let nvml = Nvml::init().map_err(|e| DriverError::Other(e.to_string()))?;
        *self.nvml.write() = Some(nvml);
        Ok(())
    }

    fn device_count(&self) -> Result<u32, DriverError> {
        self.with_nvml(|nvml| nvml.device_count())
    }

    fn device_info(&self, index: u32) -> Result<DeviceInfo, DriverError> {
        self.with_nvml(|nvml| {
            let device = nvml.device_by_index(index)?;
            Ok(DeviceInfo {
                index,
                name: device.name()?,
                uuid: device.uuid()?,
                firmware_version: device.vbios_version().ok(),
            })
        })
    }

    fn read(&self, index: u32, kind: MetricKind) -> Result<RawValue, DriverError> {
        self.with_nvml(|nvml| {
            let device = nvml.device_by_index(index)?;
            let value = match kind {
                MetricKind::Clock => RawValue::Integer(device.clock_info(Clock::Graphics)?.into()),
                MetricKind::Temperature => RawValue::Integer(device.temperature(TemperatureSensor::Gpu)?.into()),
                MetricKind::TemperatureThreshold => {
                    RawValue::Integer(device.temperature_threshold(TemperatureThreshold::Slowdown)?.into())
                },
                MetricKind::MemoryUsage => RawValue::Integer(device.memory_info()?.used),
                MetricKind::MemoryTotal => RawValue::Integer(device.memory_info()?.total),
                MetricKind::MemoryFree => RawValue::Integer(device.memory_info()?.free),
                MetricKind::Utilization => RawValue::Integer(device.utilization_rates()?.gpu.into()),
                MetricKind::MemoryUtilization => RawValue::Integer(device.utilization_rates()?.memory.into()),
                MetricKind::PowerDraw => RawValue::Integer(device.power_usage()?.into()),
                MetricKind::FanSpeed => RawValue::Integer(device.fan_speed(0)?.into()),
                MetricKind::EccErrorCount => {
                    RawValue::Integer(device.total_ecc_errors(MemoryError::Uncorrected, EccCounter::Aggregate)?)
                },
                MetricKind::RetiredPageCount => {
                    let single = device.retired_pages(RetirementCause::MultipleSingleBitEccErrors)?;
                    let double = device.retired_pages(RetirementCause::DoubleBitEccError)?;
                    RawValue::Integer((single.len() + double.len()) as u64)
                },
                MetricKind::ClockThrottleReason => RawValue::Integer(device.current_throttle_reasons()?.bits()),
                MetricKind::PciInfo => {
                    let pci = device.pci_info()?;
                    RawValue::Pci(PciInfo {
                        domain: pci.domain,
                        bus: pci.bus,
                        device: pci.device,
                        pci_device_id: pci.pci_device_id,
                        bus_id: pci.bus_id,
                    })
                },
                MetricKind::NvLinkState => {
                    let mut active = 0u64;
                    for link in 0..NVLINK_MAX_LINKS {
                        match device.link_wrapper_for(link).is_active() {
                            Ok(true) => active += 1,
                            Ok(false) => {},
                            Err(NvmlError::NotSupported) if link == 0 => return Err(NvmlError::NotSupported),
                            Err(_) => break,
                        }
                    }
                    RawValue::Integer(active)
                },
                MetricKind::PerformanceState => RawValue::Integer(performance_state_index(device.performance_state()?)?),
                MetricKind::MigMode => RawValue::Integer(device.mig_mode()?.current.into()),
                MetricKind::ProcessCount => RawValue::Integer(device.running_compute_processes_count()?.into()),
            };
            Ok(value)
        })
    }

    fn driver_version(&self) -> Result<String, DriverError> {
        self.with_nvml(|nvml| nvml.sys_driver_version())
    }

    fn shutdown(&self) {
        if let Some(nvml) = self.nvml.write().take() {
            if let Err(e) = nvml.shutdown() {
                warn!(error = %e, "NVML shutdown reported an error");
            }
        }
    }
}
