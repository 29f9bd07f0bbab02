//! Process-wide, one-time load of the native driver.
//!
//! No device on the bus can work without the native layer, so the first
//! device constructed loads it and every later device reuses the result.
//! [`DriverBootstrap`] runs its loader at most once, even when several
//! threads construct devices at the same moment; concurrent callers wait for
//! the single attempt and all observe its outcome, success or failure.
//!
//! The process-wide instance is fed by a loader registered with
//! [`register_loader`]. Device constructors that have no way to report
//! failure go through [`backend_or_exit`], which stops the process when the
//! driver cannot be loaded rather than running with a dead safety-relevant
//! sensor.

use crate::driver::DriverBackend;
use crate::error::BootstrapError;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info};

/// Function that loads the native driver.
pub type BackendLoader = fn() -> Result<DriverBackend, BootstrapError>;

/// A load-once cell for a [`DriverBackend`].
#[derive(Debug)]
pub struct DriverBootstrap {
    outcome: OnceLock<Result<DriverBackend, BootstrapError>>,
    attempts: AtomicUsize,
}

impl DriverBootstrap {
    /// Create an empty bootstrap; nothing is loaded until first use.
    pub const fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Load the backend with `loader` unless a load has already happened.
    ///
    /// The loader of the first caller runs; loaders passed by later or
    /// concurrent callers are ignored.
    ///
    /// # Errors
    ///
    /// Returns the error of the single load attempt, to every caller.
    pub fn load_with<F>(&self, loader: F) -> Result<&DriverBackend, BootstrapError>
    where
        F: FnOnce() -> Result<DriverBackend, BootstrapError>,
    {
        self.outcome
            .get_or_init(|| {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                let outcome = loader();
                match &outcome {
                    Ok(backend) => info!(backend = backend.name(), "Native driver loaded"),
                    Err(e) => error!(error = %e, "Native driver failed to load"),
                }
                outcome
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The loaded backend, if a load has completed successfully.
    pub fn get(&self) -> Option<&DriverBackend> {
        self.outcome.get().and_then(|o| o.as_ref().ok())
    }

    /// Number of times a loader has run (0 or 1).
    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for DriverBootstrap {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: DriverBootstrap = DriverBootstrap::new();
static LOADER: OnceLock<BackendLoader> = OnceLock::new();

/// Register the loader used by the process-wide bootstrap.
///
/// Only the first registration takes effect; returns `false` if a loader was
/// already registered.
pub fn register_loader(loader: BackendLoader) -> bool {
    LOADER.set(loader).is_ok()
}

/// The process-wide backend, loading it on first use.
///
/// # Errors
///
/// Returns `BootstrapError::NoLoader` if no loader was registered before the
/// first call, or the loader's own error. Either outcome is permanent.
pub fn backend() -> Result<&'static DriverBackend, BootstrapError> {
    GLOBAL.load_with(|| {
        let loader = LOADER.get().ok_or(BootstrapError::NoLoader)?;
        loader()
    })
}

/// The process-wide backend; exits the process if it cannot be loaded.
pub fn backend_or_exit() -> &'static DriverBackend {
    match backend() {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Cannot operate devices without the native driver, exiting");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{HandleDriver, RawHandle, RangingDriver, RegulatorDriver};
    use crate::driver::{DriverResult, RawMeasurement};
    use std::sync::{Arc, Barrier};
    use std::time::Duration;

    struct NullDriver;

    impl HandleDriver for NullDriver {
        fn init(&self, can_id: u8) -> RawHandle {
            RawHandle::new(u64::from(can_id))
        }

        fn free(&self, _handle: RawHandle) {}
    }

    impl RangingDriver for NullDriver {
        fn measurement(&self, _handle: RawHandle) -> Option<RawMeasurement> {
            None
        }

        fn set_ranging_mode(&self, _handle: RawHandle, _is_long: bool) -> DriverResult<()> {
            Ok(())
        }

        fn set_timing_budget(&self, _handle: RawHandle, _budget_ms: u8) -> DriverResult<()> {
            Ok(())
        }

        fn set_roi(&self, _handle: RawHandle, _x: u8, _y: u8, _w: u8, _h: u8) -> DriverResult<()> {
            Ok(())
        }
    }

    impl RegulatorDriver for NullDriver {
        fn channel_current(&self, _h: RawHandle, _c: u8) -> DriverResult<Option<f64>> {
            Ok(None)
        }

        fn channel_voltage(&self, _h: RawHandle, _c: u8) -> DriverResult<Option<f64>> {
            Ok(None)
        }

        fn channel_voltage_setpoint(&self, _h: RawHandle, _c: u8) -> DriverResult<Option<f64>> {
            Ok(None)
        }

        fn channel_enabled(&self, _h: RawHandle, _c: u8) -> DriverResult<Option<bool>> {
            Ok(None)
        }

        fn set_channel_enabled(&self, _h: RawHandle, _c: u8, _e: bool) -> DriverResult<()> {
            Ok(())
        }

        fn set_channel_voltage(&self, _h: RawHandle, _c: u8, _v: f64) -> DriverResult<()> {
            Ok(())
        }
    }

    fn null_backend() -> DriverBackend {
        let driver = Arc::new(NullDriver);
        DriverBackend::new("null", driver.clone(), driver)
    }

    #[test]
    fn test_loads_once() {
        let bootstrap = DriverBootstrap::new();
        assert!(bootstrap.get().is_none());

        let first = bootstrap.load_with(|| Ok(null_backend())).unwrap();
        assert_eq!(first.name(), "null");

        let second = bootstrap
            .load_with(|| Err(BootstrapError::LoadFailed("not called".into())))
            .unwrap();
        assert_eq!(second.name(), "null");
        assert_eq!(bootstrap.load_attempts(), 1);
        assert!(bootstrap.get().is_some());
    }

    #[test]
    fn test_failure_is_permanent() {
        let bootstrap = DriverBootstrap::new();
        let err = bootstrap
            .load_with(|| Err(BootstrapError::LoadFailed("missing library".into())))
            .unwrap_err();
        assert_eq!(err, BootstrapError::LoadFailed("missing library".into()));

        let again = bootstrap.load_with(|| Ok(null_backend())).unwrap_err();
        assert_eq!(again, err);
        assert_eq!(bootstrap.load_attempts(), 1);
        assert!(bootstrap.get().is_none());
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        const CALLERS: usize = 16;
        let bootstrap = DriverBootstrap::new();
        let loads = AtomicUsize::new(0);
        let barrier = Barrier::new(CALLERS);

        let names: Vec<String> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..CALLERS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        bootstrap
                            .load_with(|| {
                                loads.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(20));
                                Ok(null_backend())
                            })
                            .map(|b| b.name().to_string())
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(bootstrap.load_attempts(), 1);
        assert_eq!(names.len(), CALLERS);
        assert!(names.iter().all(|n| n == "null"));
    }

    #[test]
    fn test_concurrent_first_use_shares_failure() {
        const CALLERS: usize = 8;
        let bootstrap = DriverBootstrap::new();
        let barrier = Barrier::new(CALLERS);

        let errors: Vec<BootstrapError> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..CALLERS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        bootstrap
                            .load_with(|| Err(BootstrapError::LoadFailed("no bus".into())))
                            .unwrap_err()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(bootstrap.load_attempts(), 1);
        assert!(
            errors
                .iter()
                .all(|e| *e == BootstrapError::LoadFailed("no bus".into()))
        );
    }
}
