//! Device enumeration and vendor back-ends
//!
//! This module owns the driver session through [`DeviceRegistry`] and ships
//! the back-ends that implement [`crate::traits::DeviceDriver`]:
//!
//! - [`SimulatedDriver`]: scripted in-process devices
//! - `NvmlDriver`: NVIDIA Management Library (cargo feature `nvml`)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use gpu_telemetry::hardware::{DeviceRegistry, SimulatedDevice, SimulatedDriver};
//!
//! let driver = SimulatedDriver::from_devices(vec![
//!     SimulatedDevice::new(0),
//!     SimulatedDevice::datacenter(1),
//! ]);
//! let registry = DeviceRegistry::initialize(Arc::new(driver))?;
//! for handle in registry.handles() {
//!     println!("{handle}: {}", registry.info(*handle).unwrap().name);
//! }
//! # Ok::<(), gpu_telemetry::InitError>(())
//! ```

mod registry;
mod simulated;

#[cfg(feature = "nvml")]
mod nvml;

pub use registry::DeviceRegistry;
pub use simulated::{SimulatedDevice, SimulatedDriver};

#[cfg(feature = "nvml")]
pub use nvml::NvmlDriver;
