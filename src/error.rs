use crate::core::types::MetricKind;

/// Failure to bring up the driver session or enumerate devices
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("Driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Device enumeration failed: {0}")]
    Enumeration(String),
}

/// Outcome of a single failed metric read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// The device/driver combination cannot provide this metric
    #[error("{0} is not supported on this device")]
    Unsupported(MetricKind),

    /// The read failed but the device is still usable
    #[error("Transient read failure: {0}")]
    Transient(String),

    /// The device or driver is gone; the registry must be re-initialized
    #[error("Fatal device failure: {0}")]
    Fatal(String),
}

impl SampleError {
    pub(crate) fn transient<S: Into<String>>(msg: S) -> Self {
        SampleError::Transient(msg.into())
    }

    pub(crate) fn fatal<S: Into<String>>(msg: S) -> Self {
        SampleError::Fatal(msg.into())
    }

    /// Returns true for errors that end the collection run
    pub fn is_fatal(&self) -> bool {
        matches!(self, SampleError::Fatal(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("Collection aborted: {0}")]
    Fatal(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Collector is already running")]
    AlreadyRunning,

    #[error("Collector is not running")]
    NotRunning,

    #[error("Device registry is no longer valid: {0}")]
    RegistryInvalid(String),

    #[error("Collector error: {0}")]
    Collector(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn fatal<S: Into<String>>(msg: S) -> Self {
        Error::Fatal(msg.into())
    }

    pub(crate) fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub(crate) fn registry_invalid<S: Into<String>>(msg: S) -> Self {
        Error::RegistryInvalid(msg.into())
    }

    pub(crate) fn collector<S: Into<String>>(msg: S) -> Self {
        Error::Collector(msg.into())
    }
}

/// Result type for gpu-telemetry operations
pub type Result<T> = std::result::Result<T, Error>;
