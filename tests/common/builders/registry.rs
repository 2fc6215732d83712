use std::sync::Arc;

use gpu_telemetry::hardware::{DeviceRegistry, SimulatedDevice, SimulatedDriver};

/// Creates a registry over `count` simulated workstation cards
pub fn create_test_registry(count: u32) -> (Arc<SimulatedDriver>, Arc<DeviceRegistry>) {
    TestRegistryBuilder::new().workstations(count).build()
}

/// Builds a simulated driver and the registry that owns it
#[derive(Debug, Default)]
pub struct TestRegistryBuilder {
    devices: Vec<SimulatedDevice>,
}

impl TestRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workstations(mut self, count: u32) -> Self {
        for _ in 0..count {
            let index = self.devices.len() as u32;
            self.devices.push(SimulatedDevice::new(index));
        }
        self
    }

    pub fn datacenter(mut self) -> Self {
        let index = self.devices.len() as u32;
        self.devices.push(SimulatedDevice::datacenter(index));
        self
    }

    /// Adds a device built from its driver index
    pub fn device(mut self, build: impl FnOnce(u32) -> SimulatedDevice) -> Self {
        let index = self.devices.len() as u32;
        self.devices.push(build(index));
        self
    }

    pub fn build(self) -> (Arc<SimulatedDriver>, Arc<DeviceRegistry>) {
        let driver = Arc::new(SimulatedDriver::from_devices(self.devices));
        let registry = DeviceRegistry::initialize(driver.clone()).expect("simulated registry should initialize");
        (driver, Arc::new(registry))
    }
}
