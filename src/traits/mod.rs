// Traits module
//
// Trait definitions at the seams between the collection core and its
// collaborators: the vendor driver below and the consumers above.

pub mod driver;
pub mod sink;

pub use driver::{DeviceDriver, DeviceInfo, DriverError, RawValue};
pub use sink::BatchSink;

#[cfg(test)]
pub use driver::MockDeviceDriver;
