#![allow(dead_code)]

pub mod builders;
pub mod mocks;

use once_cell::sync::Lazy;

pub use builders::collector::TestRigBuilder;
pub use builders::registry::{create_test_registry, TestRegistryBuilder};
pub use mocks::driver::MockDriver;

static TRACING: Lazy<()> = Lazy::new(|| {
    gpu_telemetry::logging::init_tracing(Some("gpu_telemetry=debug"));
});

/// Installs the test subscriber once per test binary
pub fn setup() {
    Lazy::force(&TRACING);
}
