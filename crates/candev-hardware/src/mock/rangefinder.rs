//! Mock laser rangefinder.

use crate::traits::RangingDevice;
use candev_core::{
    ConfigError, Measurement, RangingMode, RegionOfInterest, StatusCode, TimingBudget,
};

/// In-memory rangefinder.
///
/// Configuration writes are stored and never fail. Measurements appear only
/// when injected with [`set_measurement_full`](Self::set_measurement_full) or
/// [`set_measurement_partial`](Self::set_measurement_partial).
///
/// # Examples
///
/// ```
/// use candev_hardware::mock::MockRangefinder;
/// use candev_hardware::traits::RangingDevice;
/// use candev_core::{RangingMode, StatusCode, TimingBudget};
///
/// let mut sensor = MockRangefinder::new();
/// sensor.set_ranging_mode(RangingMode::Long).unwrap();
/// sensor.set_timing_budget(TimingBudget::Ms100).unwrap();
///
/// sensor.set_measurement_partial(StatusCode::ValidMeasurement, 1200, 30);
///
/// let m = sensor.get_measurement().unwrap();
/// assert!(m.is_long);
/// assert_eq!(m.budget_ms, 100);
/// assert_eq!(m.distance_mm, 1200);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockRangefinder {
    mode: RangingMode,
    budget: TimingBudget,
    roi: RegionOfInterest,
    measurement: Option<Measurement>,
}

impl MockRangefinder {
    /// Create a mock with no measurement, short mode, 20 ms budget and the
    /// full 16x16 field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current measurement as given.
    pub fn set_measurement_full(&mut self, measurement: Measurement) {
        self.measurement = Some(measurement);
    }

    /// Inject a reading taken with the currently configured mode, budget and
    /// region of interest.
    pub fn set_measurement_partial(&mut self, status: StatusCode, distance_mm: u16, ambient: u16) {
        self.measurement = Some(Measurement {
            status,
            distance_mm,
            ambient,
            is_long: self.mode.is_long(),
            budget_ms: self.budget.as_millis(),
            roi: self.roi,
        });
    }

    pub fn ranging_mode(&self) -> RangingMode {
        self.mode
    }

    pub fn timing_budget(&self) -> TimingBudget {
        self.budget
    }

    pub fn region_of_interest(&self) -> RegionOfInterest {
        self.roi
    }
}

impl RangingDevice for MockRangefinder {
    fn get_measurement(&self) -> Option<Measurement> {
        self.measurement
    }

    fn set_ranging_mode(&mut self, mode: RangingMode) -> Result<(), ConfigError> {
        self.mode = mode;
        Ok(())
    }

    fn set_timing_budget(&mut self, budget: TimingBudget) -> Result<(), ConfigError> {
        self.budget = budget;
        Ok(())
    }

    fn set_region_of_interest(&mut self, roi: RegionOfInterest) -> Result<(), ConfigError> {
        self.roi = roi;
        Ok(())
    }
}
