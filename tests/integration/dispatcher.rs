use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gpu_telemetry::config::{CollectionConfig, OverflowPolicy, SampleCount};
use gpu_telemetry::core::metrics::Batch;
use gpu_telemetry::core::types::MetricKind;
use gpu_telemetry::traits::BatchSink;

use crate::common::{TestRegistryBuilder, TestRigBuilder};

#[tokio::test]
async fn test_unsubscribing_one_subscriber_leaves_the_other() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(1)).build();
    let mut keeper = rig.dispatcher.subscribe();
    let mut leaver = rig.dispatcher.subscribe();
    let config = CollectionConfig::new([MetricKind::Clock]).with_interval(Duration::from_millis(5));

    rig.collector.start(config).unwrap();
    assert_eq!(leaver.recv().await.map(|b| b.cycle), Some(1));
    assert!(rig.dispatcher.unsubscribe(leaver.id()));
    let published_at_unsubscribe = rig.dispatcher.published();

    let mut last = 0;
    while last < published_at_unsubscribe + 3 {
        last = keeper.recv().await.unwrap().cycle;
    }
    rig.collector.stop().await.unwrap();

    let mut leftover = Vec::new();
    while let Some(batch) = leaver.recv().await {
        leftover.push(batch.cycle);
    }
    assert!(leftover.iter().all(|cycle| *cycle <= published_at_unsubscribe));
    assert_eq!(rig.dispatcher.subscriber_count(), 1);
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_slow_collection() {
    let rig = TestRigBuilder::new()
        .registry(TestRegistryBuilder::new().workstations(1))
        .queue_depth(1)
        .overflow(OverflowPolicy::DropOldest)
        .build();
    let stalled = rig.dispatcher.subscribe();
    let mut active = rig.dispatcher.subscribe();
    let config = CollectionConfig::new([MetricKind::Clock])
        .with_sample_count(SampleCount::bounded(20).unwrap())
        .with_interval(Duration::from_millis(1));

    rig.collector.start(config).unwrap();
    let mut received = Vec::new();
    while let Some(batch) = tokio::time::timeout(Duration::from_secs(5), active.recv()).await.unwrap() {
        received.push(batch.cycle);
        if batch.cycle == 20 {
            break;
        }
    }
    rig.collector.wait().await.unwrap();

    assert!(received.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(stalled.pending(), 1);
    assert_eq!(stalled.dropped(), 19);
}

#[tokio::test]
async fn test_subscription_stream_ends_on_close() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(2)).build();
    let stream = rig.dispatcher.subscribe().into_stream();
    let config = CollectionConfig::default()
        .with_sample_count(SampleCount::bounded(3).unwrap())
        .with_interval(Duration::from_millis(1));

    rig.collector.start(config).unwrap();
    rig.collector.wait().await.unwrap();
    rig.dispatcher.close();

    let cycles: Vec<u64> = stream.map(|batch| batch.cycle).collect().await;
    assert_eq!(cycles, vec![1, 2, 3]);
}

#[derive(Default)]
struct CountingSink {
    batches: AtomicU64,
    entries: AtomicU64,
    closed: AtomicU64,
}

#[async_trait]
impl BatchSink for CountingSink {
    async fn on_batch(&self, batch: Arc<Batch>) {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.entries.fetch_add(batch.len() as u64, Ordering::SeqCst);
    }

    async fn on_close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_sink_receives_every_batch() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(2)).build();
    let sink = Arc::new(CountingSink::default());
    let (_, task) = rig.dispatcher.spawn_sink(Arc::clone(&sink));
    let config = CollectionConfig::new([MetricKind::Clock, MetricKind::PowerDraw, MetricKind::FanSpeed])
        .with_sample_count(SampleCount::bounded(4).unwrap())
        .with_interval(Duration::from_millis(1));

    rig.collector.start(config).unwrap();
    rig.collector.wait().await.unwrap();
    rig.dispatcher.close();
    task.await.unwrap();

    assert_eq!(sink.batches.load(Ordering::SeqCst), 4);
    assert_eq!(sink.entries.load(Ordering::SeqCst), 4 * 6);
    assert_eq!(sink.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_batches_serialize_to_json() {
    let rig = TestRigBuilder::new().registry(TestRegistryBuilder::new().workstations(1)).build();
    let mut subscription = rig.dispatcher.subscribe();
    let config = CollectionConfig::new([MetricKind::PowerDraw, MetricKind::EccErrorCount])
        .with_sample_count(SampleCount::bounded(1).unwrap());

    rig.collector.start(config).unwrap();
    rig.collector.wait().await.unwrap();

    let batch = subscription.try_recv().unwrap();
    let json = serde_json::to_value(&*batch).unwrap();
    assert_eq!(json["cycle"], 1);
    assert_eq!(json["entries"][0]["reading"]["status"], "value");
    assert_eq!(json["entries"][0]["reading"]["detail"]["value"], 300.0);
    assert_eq!(json["entries"][1]["reading"]["status"], "unsupported");
}
