//! Collection and dispatch configuration
//!
//! Both configuration types have sensible defaults, `with_*` builder methods
//! and serde support so a shell can load them from JSON.
//!
//! ```rust
//! use gpu_telemetry::config::{CollectionConfig, SampleCount};
//! use gpu_telemetry::core::types::MetricKind;
//!
//! let config = CollectionConfig::from_json_str(
//!     r#"{ "metric_kinds": ["Clock", "PowerDraw"], "sample_count": 5, "interval_ms": 250 }"#,
//! ).unwrap();
//! assert_eq!(config.metric_kinds, vec![MetricKind::Clock, MetricKind::PowerDraw]);
//! assert_eq!(config.sample_count, SampleCount::bounded(5).unwrap());
//! ```

use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_INTERVAL_MS, DEFAULT_QUEUE_DEPTH, MAX_QUEUE_DEPTH};
use crate::core::types::MetricKind;
use crate::error::{Error, Result};

/// How many cycles a collection run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<NonZeroU64>", into = "Option<NonZeroU64>")]
pub enum SampleCount {
    Bounded(NonZeroU64),
    Unbounded,
}

impl SampleCount {
    /// `Bounded(n)`; a run needs at least one cycle, so zero is rejected
    pub fn bounded(n: u64) -> Result<Self> {
        NonZeroU64::new(n)
            .map(SampleCount::Bounded)
            .ok_or_else(|| Error::invalid_config("sample count must be at least 1, or unbounded"))
    }

    pub fn limit(&self) -> Option<u64> {
        match self {
            SampleCount::Bounded(n) => Some(n.get()),
            SampleCount::Unbounded => None,
        }
    }

    /// Whether `completed` cycles finish the run
    pub fn is_reached(&self, completed: u64) -> bool {
        self.limit().is_some_and(|limit| completed >= limit)
    }
}

impl From<Option<NonZeroU64>> for SampleCount {
    fn from(value: Option<NonZeroU64>) -> Self {
        value.map_or(SampleCount::Unbounded, SampleCount::Bounded)
    }
}

impl From<SampleCount> for Option<NonZeroU64> {
    fn from(value: SampleCount) -> Self {
        match value {
            SampleCount::Bounded(n) => Some(n),
            SampleCount::Unbounded => None,
        }
    }
}

/// What `stop()` does with the cycle in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Complete and publish the in-flight cycle, then stop
    #[default]
    FinishCycle,
    /// Stop at the next between-sample check and drop the partial batch
    AbandonCycle,
}

/// Parameters of one collection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Kinds sampled per device, in sampling order
    pub metric_kinds: Vec<MetricKind>,
    /// Cycles to run before stopping on its own
    pub sample_count: SampleCount,
    /// Target time between the starts of consecutive cycles
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,
    pub stop_policy: StopPolicy,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            metric_kinds: MetricKind::default_set(),
            sample_count: SampleCount::Unbounded,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            stop_policy: StopPolicy::default(),
        }
    }
}

impl CollectionConfig {
    pub fn new(metric_kinds: impl IntoIterator<Item = MetricKind>) -> Self {
        Self::default().with_kinds(metric_kinds)
    }

    /// Sets the sampled kinds; duplicates keep their first position
    pub fn with_kinds(mut self, metric_kinds: impl IntoIterator<Item = MetricKind>) -> Self {
        self.metric_kinds = Vec::new();
        for kind in metric_kinds {
            if !self.metric_kinds.contains(&kind) {
                self.metric_kinds.push(kind);
            }
        }
        self
    }

    pub fn with_sample_count(mut self, sample_count: SampleCount) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_stop_policy(mut self, stop_policy: StopPolicy) -> Self {
        self.stop_policy = stop_policy;
        self
    }

    /// Parses a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        let kinds = std::mem::take(&mut config.metric_kinds);
        let config = config.with_kinds(kinds);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metric_kinds.is_empty() {
            return Err(Error::invalid_config("at least one metric kind is required"));
        }
        for (i, kind) in self.metric_kinds.iter().enumerate() {
            if self.metric_kinds[..i].contains(kind) {
                return Err(Error::invalid_config(format!("{kind} is listed more than once")));
            }
        }
        Ok(())
    }
}

/// Behaviour when a subscriber queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued batch to make room
    #[default]
    DropOldest,
    /// Discard the incoming batch
    DropNewest,
}

/// Per-subscriber queueing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub queue_depth: usize,
    pub overflow: OverflowPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { queue_depth: DEFAULT_QUEUE_DEPTH, overflow: OverflowPolicy::default() }
    }
}

impl DispatcherConfig {
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 || self.queue_depth > MAX_QUEUE_DEPTH {
            return Err(Error::invalid_config(format!(
                "queue depth must be between 1 and {MAX_QUEUE_DEPTH}, got {}",
                self.queue_depth
            )));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
