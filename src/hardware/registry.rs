use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::core::types::DeviceHandle;
use crate::error::InitError;
use crate::traits::{DeviceDriver, DeviceInfo};

/// Enumerates devices once and owns the driver session
///
/// The handle set is fixed at [`DeviceRegistry::initialize`]; there is no
/// hot-plug re-enumeration. The session is shut down exactly once, either by
/// [`DeviceRegistry::release`] or when the registry is dropped.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use gpu_telemetry::hardware::{DeviceRegistry, SimulatedDriver};
///
/// let driver = Arc::new(SimulatedDriver::with_devices(2));
/// let registry = DeviceRegistry::initialize(driver.clone()).unwrap();
/// assert_eq!(registry.count(), 2);
///
/// registry.release();
/// registry.release();
/// assert_eq!(driver.shutdown_count(), 1);
/// ```
pub struct DeviceRegistry {
    driver: Arc<dyn DeviceDriver>,
    handles: Vec<DeviceHandle>,
    devices: Vec<DeviceInfo>,
    released: AtomicBool,
    invalidated: Mutex<Option<String>>,
}

impl DeviceRegistry {
    /// Opens the driver session and enumerates every device
    ///
    /// Zero devices is a valid, empty registry. If enumeration fails after the
    /// session opened, the session is shut down before the error is returned.
    #[instrument(skip(driver), fields(backend = %driver.name()))]
    pub fn initialize(driver: Arc<dyn DeviceDriver>) -> Result<Self, InitError> {
        driver.init().map_err(|e| InitError::DriverUnavailable(e.to_string()))?;

        // Shut the session down unless enumeration succeeds
        let session = scopeguard::guard(Arc::clone(&driver), |driver| {
            warn!("enumeration failed, shutting down driver session");
            driver.shutdown();
        });

        let count = session.device_count().map_err(|e| e.into_init_error())?;
        let mut handles = Vec::with_capacity(count as usize);
        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let info = session.device_info(index).map_err(|e| e.into_init_error())?;
            debug!(index, name = %info.name, uuid = %info.uuid, "enumerated device");
            handles.push(DeviceHandle::new(handles.len() as u32, index));
            devices.push(info);
        }

        let driver = scopeguard::ScopeGuard::into_inner(session);
        info!(count, "device registry initialized");

        Ok(Self { driver, handles, devices, released: AtomicBool::new(false), invalidated: Mutex::new(None) })
    }

    /// Number of enumerated devices
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    /// Handles in registry order
    pub fn handles(&self) -> &[DeviceHandle] {
        &self.handles
    }

    /// Enumeration data for a handle minted by this registry
    pub fn info(&self, handle: DeviceHandle) -> Option<&DeviceInfo> {
        self.devices.get(handle.ordinal() as usize).filter(|info| info.index == handle.index())
    }

    pub fn driver(&self) -> &Arc<dyn DeviceDriver> {
        &self.driver
    }

    /// Best-effort driver version string
    pub fn driver_version(&self) -> Option<String> {
        if self.is_released() {
            return None;
        }
        self.driver.driver_version().ok()
    }

    /// Shuts the driver session down; later calls are no-ops
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.driver.shutdown();
            info!(backend = %self.driver.name(), "device registry released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Marks the registry unusable after a fatal device error
    pub fn invalidate(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "device registry invalidated");
        let mut invalidated = self.invalidated.lock();
        invalidated.get_or_insert(reason);
    }

    /// False once released or invalidated
    pub fn is_valid(&self) -> bool {
        !self.is_released() && self.invalidated.lock().is_none()
    }

    /// Why the registry was invalidated, if it was
    pub fn invalidation_reason(&self) -> Option<String> {
        self.invalidated.lock().clone()
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("driver", &self.driver.name())
            .field("handles", &self.handles)
            .field("released", &self.is_released())
            .finish()
    }
}
