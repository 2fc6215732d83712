//! Tracing setup for binaries and tests embedding the library
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host. [`init_tracing`] is a convenience for hosts that
//! want plain console output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directive used when neither `RUST_LOG` nor a caller default is given
pub const DEFAULT_DIRECTIVE: &str = "gpu_telemetry=info";

/// Installs a console subscriber filtered by `RUST_LOG`
///
/// `default_directive` applies when `RUST_LOG` is unset or invalid. Returns
/// `false` if a global subscriber was already installed, so calling this
/// more than once is harmless.
pub fn init_tracing(default_directive: Option<&str>) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive.unwrap_or(DEFAULT_DIRECTIVE)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .try_init()
        .is_ok()
}
