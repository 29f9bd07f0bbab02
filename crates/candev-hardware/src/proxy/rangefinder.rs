//! Hardware-backed laser rangefinder.

use crate::bootstrap;
use crate::driver::{DriverBackend, RangingDriver};
use crate::error::BootstrapError;
use crate::handle::{HandleState, NativeHandle};
use crate::traits::RangingDevice;
use candev_core::{ConfigError, Measurement, RangingMode, RegionOfInterest, TimingBudget};
use tracing::debug;

/// Laser rangefinder on the CAN bus.
///
/// One CAN id must map to one sensor, or readings will conflict.
///
/// # Examples
///
/// ```
/// use candev_hardware::proxy::LaserRangefinder;
/// use candev_hardware::sim::SimDriver;
/// use candev_hardware::traits::RangingDevice;
/// use candev_core::{RangingMode, TimingBudget};
///
/// let backend = SimDriver::new().into_backend();
/// let mut sensor = LaserRangefinder::with_backend(&backend, 1);
///
/// sensor.set_ranging_mode(RangingMode::Short).unwrap();
/// sensor.set_timing_budget(TimingBudget::Ms33).unwrap();
///
/// // Nothing has been received from the bus yet.
/// assert!(sensor.get_measurement().is_none());
///
/// sensor.close();
/// ```
#[derive(Debug)]
pub struct LaserRangefinder {
    handle: NativeHandle<dyn RangingDriver>,
}

impl LaserRangefinder {
    /// Create a rangefinder using the process-wide native driver.
    ///
    /// Loads the driver on first use. If it cannot be loaded the process
    /// exits; use [`try_new`](Self::try_new) to handle that yourself.
    pub fn new(can_id: u8) -> Self {
        Self::with_backend(bootstrap::backend_or_exit(), can_id)
    }

    /// Create a rangefinder using the process-wide native driver.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap failure if the driver cannot be loaded.
    pub fn try_new(can_id: u8) -> Result<Self, BootstrapError> {
        Ok(Self::with_backend(bootstrap::backend()?, can_id))
    }

    /// Create a rangefinder on an explicit backend.
    pub fn with_backend(backend: &DriverBackend, can_id: u8) -> Self {
        Self {
            handle: NativeHandle::acquire(backend.ranging(), can_id),
        }
    }

    /// CAN id of the sensor.
    pub fn can_id(&self) -> u8 {
        self.handle.can_id()
    }

    /// Lifecycle state of the native handle.
    pub fn handle_state(&self) -> HandleState {
        self.handle.state()
    }

    /// Free the native instance.
    pub fn close(self) {
        self.handle.release();
    }
}

impl RangingDevice for LaserRangefinder {
    fn get_measurement(&self) -> Option<Measurement> {
        let raw = self.handle.driver().measurement(self.handle.raw())?;
        match Measurement::try_from(raw) {
            Ok(measurement) => Some(measurement),
            Err(e) => {
                debug!(can_id = self.can_id(), error = %e, "Discarding malformed measurement frame");
                None
            }
        }
    }

    fn set_ranging_mode(&mut self, mode: RangingMode) -> Result<(), ConfigError> {
        self.handle
            .driver()
            .set_ranging_mode(self.handle.raw(), mode.is_long())?;
        Ok(())
    }

    fn set_timing_budget(&mut self, budget: TimingBudget) -> Result<(), ConfigError> {
        self.handle
            .driver()
            .set_timing_budget(self.handle.raw(), budget.as_millis())?;
        Ok(())
    }

    fn set_region_of_interest(&mut self, roi: RegionOfInterest) -> Result<(), ConfigError> {
        self.handle
            .driver()
            .set_roi(self.handle.raw(), roi.x, roi.y, roi.w, roi.h)?;
        Ok(())
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::sim::SimDriver;
    use candev_core::{DeviceError, ErrorCode, StatusCode};
    use std::sync::Arc;

    fn sample(status: StatusCode) -> Measurement {
        Measurement {
            status,
            distance_mm: 640,
            ambient: 18,
            is_long: false,
            budget_ms: 33,
            roi: RegionOfInterest::new(8, 8, 16, 16),
        }
    }

    #[test]
    fn test_absent_until_frame_received() {
        let sim = Arc::new(SimDriver::new());
        let sensor = LaserRangefinder::with_backend(&sim.backend(), 5);

        assert_eq!(sensor.get_measurement(), None);

        sim.publish_measurement(5, sample(StatusCode::ValidMeasurement).into());
        assert_eq!(
            sensor.get_measurement(),
            Some(sample(StatusCode::ValidMeasurement))
        );
    }

    #[test]
    fn test_malformed_frame_reads_as_absent() {
        let sim = Arc::new(SimDriver::new());
        let sensor = LaserRangefinder::with_backend(&sim.backend(), 5);

        let mut raw: crate::driver::RawMeasurement = sample(StatusCode::NoiseIssue).into();
        raw.status = 3;
        sim.publish_measurement(5, raw);

        for _ in 0..3 {
            assert_eq!(sensor.get_measurement(), None);
        }
    }

    #[test]
    fn test_configuration_reaches_driver() {
        let sim = Arc::new(SimDriver::new());
        let mut sensor = LaserRangefinder::with_backend(&sim.backend(), 2);

        sensor.set_ranging_mode(RangingMode::Long).unwrap();
        sensor.set_timing_budget(TimingBudget::Ms100).unwrap();
        sensor
            .set_region_of_interest(RegionOfInterest::new(4, 4, 8, 8))
            .unwrap();

        let config = sim.rangefinder_config(2).unwrap();
        assert!(config.is_long);
        assert_eq!(config.budget_ms, 100);
        assert_eq!(config.roi, RegionOfInterest::new(4, 4, 8, 8));
    }

    #[test]
    fn test_rejected_roi_is_param_out_of_bounds() {
        let sim = Arc::new(SimDriver::new());
        let mut sensor = LaserRangefinder::with_backend(&sim.backend(), 2);

        let err = sensor
            .set_region_of_interest(RegionOfInterest::new(0, 0, 2, 2))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorCode::ParamOutOfBounds);
    }

    #[test]
    fn test_driver_error_passes_through() {
        let sim = Arc::new(SimDriver::new());
        let mut sensor = LaserRangefinder::with_backend(&sim.backend(), 2);

        sim.fail_next_ranging_write(2, DeviceError::timed_out("no ack from sensor"));
        let err = sensor.set_timing_budget(TimingBudget::Ms20).unwrap_err();
        assert_eq!(err.kind(), ErrorCode::TimedOut);
        assert_eq!(err.message(), "no ack from sensor");

        // Resending succeeds; the last successful write wins.
        sensor.set_timing_budget(TimingBudget::Ms20).unwrap();
        assert_eq!(sim.rangefinder_config(2).unwrap().budget_ms, 20);
    }

    #[test]
    fn test_close_then_drop_frees_once() {
        let sim = Arc::new(SimDriver::new());
        let sensor = LaserRangefinder::with_backend(&sim.backend(), 1);
        assert_eq!(sensor.handle_state(), HandleState::Active);

        sensor.close();

        let stats = sim.stats();
        assert_eq!(stats.inits, 1);
        assert_eq!(stats.frees, 1);
        assert_eq!(stats.rejected_frees, 0);
    }

    #[test]
    fn test_drop_without_close_frees() {
        let sim = Arc::new(SimDriver::new());
        {
            let _sensor = LaserRangefinder::with_backend(&sim.backend(), 1);
        }
        assert_eq!(sim.stats().frees, 1);
        assert_eq!(sim.stats().live_handles, 0);
    }
}
