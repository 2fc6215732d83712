use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gpu_telemetry::logging::init_tracing;
use gpu_telemetry::prelude::*;
use tracing::{error, info};

/// Keeps a running average of the power draw of every device
#[derive(Default)]
struct PowerSummary {
    batches: AtomicU64,
    total_milliwatts: AtomicU64,
}

#[async_trait]
impl BatchSink for PowerSummary {
    async fn on_batch(&self, batch: Arc<Batch>) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        let watts: f64 = batch
            .samples()
            .filter(|sample| sample.kind == MetricKind::PowerDraw)
            .filter_map(|sample| sample.value.as_f64())
            .sum();
        self.total_milliwatts.fetch_add((watts * 1000.0) as u64, Ordering::Relaxed);
    }

    async fn on_close(&self) {
        let batches = self.batches.load(Ordering::Relaxed).max(1);
        let average = self.total_milliwatts.load(Ordering::Relaxed) as f64 / batches as f64 / 1000.0;
        println!("average combined power draw: {average:.1} W over {batches} cycles");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(Some("info"));

    // One workstation card and one datacenter card with a flaky fan sensor
    let driver = Arc::new(SimulatedDriver::from_devices(vec![
        SimulatedDevice::new(0).with_name("Simulated Workstation"),
        SimulatedDevice::datacenter(1).with_transient_failures(MetricKind::FanSpeed, 2),
    ]));
    let registry = Arc::new(DeviceRegistry::initialize(driver)?);
    for handle in registry.handles() {
        if let Some(device) = registry.info(*handle) {
            info!(%handle, name = %device.name, uuid = %device.uuid, "found device");
        }
    }
    if let Some(version) = registry.driver_version() {
        info!(%version, "driver session open");
    }

    let dispatcher = Dispatcher::with_config(DispatcherConfig::default().with_queue_depth(8))?;
    let mut printer = dispatcher.subscribe();
    let summary = Arc::new(PowerSummary::default());
    let (_, summary_task) = dispatcher.spawn_sink(Arc::clone(&summary));

    let printer_task = tokio::spawn(async move {
        while let Some(batch) = printer.recv().await {
            match serde_json::to_string_pretty(&*batch) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("failed to encode batch {}: {e}", batch.cycle),
            }
        }
    });

    let collector = Collector::new(Arc::clone(&registry), dispatcher.clone());
    let config = CollectionConfig::new([
        MetricKind::Clock,
        MetricKind::Temperature,
        MetricKind::MemoryUsage,
        MetricKind::PowerDraw,
        MetricKind::FanSpeed,
        MetricKind::EccErrorCount,
        MetricKind::PciInfo,
    ])
    .with_sample_count(SampleCount::bounded(5)?)
    .with_interval(Duration::from_millis(200));

    collector.start(config)?;
    let outcome = collector.wait().await?;
    info!(?outcome, "collection done");

    dispatcher.close();
    if let Err(e) = printer_task.await {
        error!(error = %e, "printer task failed");
    }
    if let Err(e) = summary_task.await {
        error!(error = %e, "summary sink task failed");
    }

    registry.release();
    Ok(())
}
