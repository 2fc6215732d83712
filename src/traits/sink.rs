use std::sync::Arc;

use async_trait::async_trait;

use crate::core::metrics::Batch;

/// Callback-style consumer of completed batches
///
/// Attach one with [`crate::dispatch::Dispatcher::spawn_sink`]. The sink runs
/// on its own tokio task, so a slow `on_batch` only delays this sink.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use gpu_telemetry::core::metrics::Batch;
/// use gpu_telemetry::traits::BatchSink;
///
/// struct Printer;
///
/// #[async_trait::async_trait]
/// impl BatchSink for Printer {
///     async fn on_batch(&self, batch: Arc<Batch>) {
///         println!("cycle {} carried {} entries", batch.cycle, batch.len());
///     }
/// }
/// ```
#[async_trait]
pub trait BatchSink: Send + Sync + 'static {
    /// Handle one completed batch
    async fn on_batch(&self, batch: Arc<Batch>);

    /// Called once after the subscription closes
    async fn on_close(&self) {}
}
