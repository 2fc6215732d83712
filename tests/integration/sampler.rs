use std::sync::Arc;

use gpu_telemetry::core::metrics::Reading;
use gpu_telemetry::core::types::{MetricKind, MetricValue, Unit};
use gpu_telemetry::hardware::SimulatedDevice;
use gpu_telemetry::sampler::Sampler;
use gpu_telemetry::traits::RawValue;
use gpu_telemetry::SampleError;

use crate::common::TestRegistryBuilder;

#[test]
fn test_simulated_values_are_normalized() {
    let (driver, registry) = TestRegistryBuilder::new().workstations(1).build();
    let sampler = Sampler::new(Arc::clone(registry.driver()));
    let gpu0 = registry.handles()[0];

    driver.set_value(0, MetricKind::PowerDraw, RawValue::Integer(300_000));
    driver.set_value(0, MetricKind::Clock, RawValue::Integer(1500));
    driver.set_value(0, MetricKind::MemoryUsage, RawValue::Integer(1_048_576));

    let power = sampler.sample(gpu0, MetricKind::PowerDraw).unwrap();
    assert_eq!(power.value, MetricValue::Float(300.0));
    assert_eq!(power.unit(), Unit::Watts);
    assert_eq!(sampler.sample(gpu0, MetricKind::Clock).unwrap().value, MetricValue::Float(1.5));
    assert_eq!(sampler.sample(gpu0, MetricKind::MemoryUsage).unwrap().value, MetricValue::Float(1.0));
    assert_eq!(sampler.sample(gpu0, MetricKind::Temperature).unwrap().value, MetricValue::Float(45.0));
}

#[test]
fn test_process_count_is_reported_as_a_plain_count() {
    let (driver, registry) = TestRegistryBuilder::new().workstations(1).build();
    let sampler = Sampler::new(Arc::clone(registry.driver()));
    let gpu0 = registry.handles()[0];

    let processes = sampler.sample(gpu0, MetricKind::ProcessCount).unwrap();
    assert_eq!(processes.value, MetricValue::Integer(3));
    assert_eq!(processes.unit(), Unit::Count);

    driver.set_value(0, MetricKind::ProcessCount, RawValue::Integer(0));
    assert_eq!(sampler.sample(gpu0, MetricKind::ProcessCount).unwrap().value, MetricValue::Integer(0));
}

#[test]
fn test_workstation_reports_unsupported_kinds() {
    let (_, registry) = TestRegistryBuilder::new().workstations(1).build();
    let sampler = Sampler::new(Arc::clone(registry.driver()));
    let gpu0 = registry.handles()[0];

    assert_eq!(
        sampler.sample(gpu0, MetricKind::EccErrorCount),
        Err(SampleError::Unsupported(MetricKind::EccErrorCount))
    );
    assert_eq!(sampler.read(gpu0, MetricKind::MigMode), Ok(Reading::Unsupported));
}

#[test]
fn test_pci_info_is_structured() {
    let (_, registry) = TestRegistryBuilder::new().workstations(2).build();
    let sampler = Sampler::new(Arc::clone(registry.driver()));

    let sample = sampler.sample(registry.handles()[1], MetricKind::PciInfo).unwrap();
    match sample.value {
        MetricValue::Pci(info) => {
            assert_eq!(info.bus, 2);
            assert_eq!(info.bus_id, "00000000:02:00.0");
        },
        other => panic!("expected a PCI descriptor, got {other:?}"),
    }
}

#[test]
fn test_transient_failures_clear_on_retry() {
    let (_, registry) = TestRegistryBuilder::new()
        .device(|index| SimulatedDevice::new(index).with_transient_failures(MetricKind::FanSpeed, 1))
        .build();
    let sampler = Sampler::new(Arc::clone(registry.driver()));
    let gpu0 = registry.handles()[0];

    assert!(sampler.read(gpu0, MetricKind::FanSpeed).unwrap().is_failed());
    assert_eq!(
        sampler.read(gpu0, MetricKind::FanSpeed).unwrap().sample().map(|s| s.value.clone()),
        Some(MetricValue::Integer(40))
    );
}

#[test]
fn test_released_session_is_fatal() {
    let (_, registry) = TestRegistryBuilder::new().workstations(1).build();
    let sampler = Sampler::new(Arc::clone(registry.driver()));
    let gpu0 = registry.handles()[0];
    registry.release();

    assert!(sampler.read(gpu0, MetricKind::Clock).unwrap_err().is_fatal());
}
