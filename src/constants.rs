//! Default values shared by the configuration types

use std::time::Duration;

/// Default pause between the start of two collection cycles in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Default per-subscriber queue depth; consumers care about current state
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

/// Upper bound on a subscriber queue
pub const MAX_QUEUE_DEPTH: usize = 1024;

/// How long `Collector::stop` waits for the worker to exit
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Unit conversion divisors
pub mod units {
    /// Milliwatts per watt
    pub const MILLIWATTS_PER_WATT: f64 = 1000.0;
    /// Raw driver clock units per reported clock unit
    pub const CLOCK_DIVISOR: f64 = 1000.0;
    /// Bytes per megabyte (1024²)
    pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
}

/// Simulated back-end defaults
pub mod simulated {
    /// Graphics clock reported by a simulated device (raw driver units)
    pub const CLOCK_RAW: u64 = 1500;
    /// Core temperature in Celsius
    pub const TEMPERATURE_C: u64 = 45;
    /// Slowdown threshold in Celsius
    pub const TEMPERATURE_THRESHOLD_C: u64 = 90;
    /// 16 GiB of device memory
    pub const MEMORY_TOTAL_BYTES: u64 = 16 * 1024 * 1024 * 1024;
    /// 4 GiB in use
    pub const MEMORY_USED_BYTES: u64 = 4 * 1024 * 1024 * 1024;
    /// Power draw in milliwatts
    pub const POWER_MW: u64 = 300_000;
    /// Running compute processes
    pub const PROCESS_COUNT: u64 = 3;
    /// VBIOS version reported by every simulated device
    pub const FIRMWARE_VERSION: &str = "96.00.5E.00.01";
}
