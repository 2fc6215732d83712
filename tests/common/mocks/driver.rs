use gpu_telemetry::core::types::MetricKind;
use gpu_telemetry::traits::{DeviceDriver, DeviceInfo, DriverError, RawValue};
use mockall::mock;

mock! {
    pub Driver {}

    impl DeviceDriver for Driver {
        fn name(&self) -> String;
        fn init(&self) -> Result<(), DriverError>;
        fn device_count(&self) -> Result<u32, DriverError>;
        fn device_info(&self, index: u32) -> Result<DeviceInfo, DriverError>;
        fn read(&self, index: u32, kind: MetricKind) -> Result<RawValue, DriverError>;
        fn driver_version(&self) -> Result<String, DriverError>;
        fn shutdown(&self);
    }
}

/// Device info the way a vendor library would report it
pub fn device_info(index: u32) -> DeviceInfo {
    DeviceInfo {
        index,
        name: format!("Mock GPU {index}"),
        uuid: format!("GPU-mock-{index:04}"),
        firmware_version: None,
    }
}
