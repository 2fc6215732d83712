use std::time::Duration;

use gpu_telemetry::collector::{CollectorState, RunOutcome};
use gpu_telemetry::config::{CollectionConfig, SampleCount, StopPolicy};
use gpu_telemetry::core::metrics::Reading;
use gpu_telemetry::core::types::{MetricKind, MetricValue};
use gpu_telemetry::hardware::SimulatedDevice;
use gpu_telemetry::Error;

use crate::common::{self, TestRegistryBuilder, TestRigBuilder};

fn bounded(count: u64, kinds: &[MetricKind]) -> CollectionConfig {
    CollectionConfig::new(kinds.iter().copied())
        .with_sample_count(SampleCount::bounded(count).unwrap())
        .with_interval(Duration::from_millis(2))
}

#[tokio::test]
async fn test_every_batch_covers_every_pair() {
    common::setup();
    let kinds = [MetricKind::Clock, MetricKind::Temperature, MetricKind::PowerDraw];
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(3)).build();
    let mut subscription = rig.dispatcher.subscribe();

    rig.collector.start(bounded(4, &kinds)).unwrap();
    rig.collector.wait().await.unwrap();

    let mut seen = 0;
    while let Some(batch) = subscription.try_recv() {
        seen += 1;
        assert_eq!(batch.len(), 3 * kinds.len());
        for handle in rig.registry.handles() {
            for kind in kinds {
                assert!(batch.get(*handle, kind).is_some(), "{handle} {kind} missing from cycle {}", batch.cycle);
            }
        }
        assert!(batch.finished_at >= batch.started_at);
    }
    assert_eq!(seen, 4);
}

#[tokio::test]
async fn test_entries_follow_registry_then_config_order() {
    let kinds = [MetricKind::PowerDraw, MetricKind::Clock];
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(2)).build();
    let mut subscription = rig.dispatcher.subscribe();

    rig.collector.start(bounded(1, &kinds)).unwrap();
    rig.collector.wait().await.unwrap();

    let batch = subscription.try_recv().unwrap();
    let order: Vec<_> = batch.entries.iter().map(|e| (e.device.ordinal(), e.kind)).collect();
    assert_eq!(
        order,
        vec![(0, MetricKind::PowerDraw), (0, MetricKind::Clock), (1, MetricKind::PowerDraw), (1, MetricKind::Clock)]
    );
}

#[tokio::test]
async fn test_cycles_are_strictly_increasing() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(1)).build();
    let mut subscription = rig.dispatcher.subscribe();

    rig.collector.start(bounded(6, &[MetricKind::Clock])).unwrap();
    rig.collector.wait().await.unwrap();

    let mut cycles = Vec::new();
    while let Some(batch) = subscription.try_recv() {
        cycles.push(batch.cycle);
    }
    assert_eq!(cycles, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_unsupported_and_transient_keep_batch_size() {
    let registry = TestRegistryBuilder::new()
        .device(|index| SimulatedDevice::new(index).with_transient_failures(MetricKind::Temperature, 1))
        .datacenter();
    let rig = TestRigBuilder::new().registry(registry).build();
    let mut subscription = rig.dispatcher.subscribe();
    let kinds = [MetricKind::Temperature, MetricKind::EccErrorCount];

    rig.collector.start(bounded(2, &kinds)).unwrap();
    assert_eq!(rig.collector.wait().await.unwrap(), RunOutcome::Completed { cycles: 2 });

    let gpu0 = rig.registry.handles()[0];
    let gpu1 = rig.registry.handles()[1];

    let first = subscription.try_recv().unwrap();
    assert_eq!(first.len(), 4);
    assert!(first.get(gpu0, MetricKind::Temperature).unwrap().is_failed());
    assert_eq!(first.get(gpu0, MetricKind::EccErrorCount), Some(&Reading::Unsupported));
    assert!(first.get(gpu1, MetricKind::EccErrorCount).unwrap().sample().is_some());

    let second = subscription.try_recv().unwrap();
    assert_eq!(second.len(), 4);
    let temperature = second.get(gpu0, MetricKind::Temperature).unwrap().sample().unwrap();
    assert_eq!(temperature.value, MetricValue::Float(45.0));
}

#[tokio::test]
async fn test_sample_count_five_yields_five_batches_then_idle() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(2)).build();
    let mut subscription = rig.dispatcher.subscribe();

    rig.collector.start(bounded(5, &[MetricKind::Clock, MetricKind::MemoryUsage])).unwrap();
    assert_eq!(rig.collector.wait().await.unwrap(), RunOutcome::Completed { cycles: 5 });
    assert_eq!(rig.collector.state(), CollectorState::Idle);
    assert_eq!(rig.dispatcher.published(), 5);

    let mut count = 0;
    while subscription.try_recv().is_some() {
        count += 1;
    }
    assert_eq!(count, 5);
    assert!(matches!(rig.collector.stop().await, Err(Error::NotRunning)));
}

#[tokio::test]
async fn test_stop_returns_to_idle_and_restart_begins_at_one() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(1)).build();
    let mut subscription = rig.dispatcher.subscribe();
    let config = CollectionConfig::default().with_interval(Duration::from_millis(5));

    for _ in 0..2 {
        rig.collector.start(config.clone()).unwrap();
        assert_eq!(rig.collector.state(), CollectorState::Running);
        assert_eq!(subscription.recv().await.map(|b| b.cycle), Some(1));

        let outcome = rig.collector.stop().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Stopped { cycles } if cycles >= 1));
        assert_eq!(rig.collector.state(), CollectorState::Idle);
        while subscription.try_recv().is_some() {}
    }
}

#[tokio::test]
async fn test_stop_interrupts_long_interval() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(1)).build();
    let mut subscription = rig.dispatcher.subscribe();
    rig.collector.start(CollectionConfig::default().with_interval(Duration::from_secs(3600))).unwrap();
    subscription.recv().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), rig.collector.stop()).await.unwrap().unwrap();
    assert_eq!(outcome, RunOutcome::Stopped { cycles: 1 });
}

#[tokio::test]
async fn test_abandon_cycle_publishes_nothing_partial() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(2)).build();
    let config = CollectionConfig::new([MetricKind::Clock, MetricKind::Temperature])
        .with_interval(Duration::from_secs(3600))
        .with_stop_policy(StopPolicy::AbandonCycle);
    let mut subscription = rig.dispatcher.subscribe();

    rig.collector.start(config).unwrap();
    subscription.recv().await.unwrap();
    let outcome = rig.collector.stop().await.unwrap();

    assert_eq!(outcome, RunOutcome::Stopped { cycles: 1 });
    assert_eq!(rig.dispatcher.published(), 1);
}

#[tokio::test]
async fn test_device_loss_aborts_run_and_invalidates_registry() {
    let registry = TestRegistryBuilder::new().workstations(1).device(|index| SimulatedDevice::new(index).lost_after(2));
    let rig = TestRigBuilder::new().registry(registry).build();
    let config = bounded(10, &[MetricKind::Clock, MetricKind::Temperature]);

    rig.collector.start(config.clone()).unwrap();
    let result = rig.collector.wait().await;

    assert!(matches!(result, Err(Error::Fatal(reason)) if reason.contains("no longer reachable")));
    assert_eq!(rig.collector.state(), CollectorState::Idle);
    assert_eq!(rig.dispatcher.published(), 1);
    assert!(!rig.registry.is_valid());
    assert!(rig.registry.invalidation_reason().is_some());
    assert!(matches!(rig.collector.start(config), Err(Error::RegistryInvalid(_))));
}

#[tokio::test]
async fn test_released_registry_cannot_start() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(1)).build();
    rig.registry.release();
    assert!(matches!(rig.collector.start(CollectionConfig::default()), Err(Error::RegistryInvalid(_))));
    assert_eq!(rig.collector.state(), CollectorState::Idle);
}

#[tokio::test]
async fn test_empty_registry_publishes_empty_batches() {
    let rig = TestRigBuilder::new().build();
    let mut subscription = rig.dispatcher.subscribe();

    rig.collector.start(bounded(2, &[MetricKind::Clock])).unwrap();
    assert_eq!(rig.collector.wait().await.unwrap(), RunOutcome::Completed { cycles: 2 });
    assert!(subscription.try_recv().unwrap().is_empty());
}
