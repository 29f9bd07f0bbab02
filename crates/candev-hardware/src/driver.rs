//! Boundary with the native CAN driver.
//!
//! The native driver owns the bus: frame encoding, arbitration and the
//! firmware protocol all live behind these traits. The host side only sees an
//! opaque [`RawHandle`] per device instance plus per-family get/set calls that
//! take primitive arguments and report failures as [`DeviceError`].
//!
//! A [`DriverBackend`] bundles one driver per device family and is what the
//! [`bootstrap`](crate::bootstrap) loads once per process.

use candev_core::{DeviceError, Measurement, RegionOfInterest, StatusCode, TimingBudget};
use std::fmt;
use std::sync::Arc;

/// Result of a native driver call.
pub type DriverResult<T> = std::result::Result<T, DeviceError>;

/// Opaque token identifying one native-side device instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    /// Wrap a driver-issued token.
    pub const fn new(token: u64) -> Self {
        Self(token)
    }

    /// The driver-issued token.
    pub const fn token(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Allocation and release of native device instances.
///
/// `init` never fails observably; a device that is absent from the bus shows
/// up later as absent telemetry or failed writes. `free` must be called
/// exactly once per handle, which [`NativeHandle`](crate::handle::NativeHandle)
/// guarantees.
pub trait HandleDriver: Send + Sync {
    /// Allocate a native instance for the device with this CAN id.
    fn init(&self, can_id: u8) -> RawHandle;

    /// Release a native instance.
    fn free(&self, handle: RawHandle);
}

/// Measurement frame exactly as the driver caches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMeasurement {
    pub status: u8,
    pub distance_mm: u16,
    pub ambient: u16,
    pub is_long: bool,
    pub budget_ms: u8,
    pub roi: RegionOfInterest,
}

impl TryFrom<RawMeasurement> for Measurement {
    type Error = candev_core::Error;

    fn try_from(raw: RawMeasurement) -> candev_core::Result<Self> {
        // Budget is checked for membership only; the literal is kept as reported.
        TimingBudget::from_millis(raw.budget_ms)?;
        Ok(Measurement {
            status: StatusCode::from_code(raw.status)?,
            distance_mm: raw.distance_mm,
            ambient: raw.ambient,
            is_long: raw.is_long,
            budget_ms: raw.budget_ms,
            roi: raw.roi,
        })
    }
}

impl From<Measurement> for RawMeasurement {
    fn from(m: Measurement) -> Self {
        Self {
            status: m.status.code(),
            distance_mm: m.distance_mm,
            ambient: m.ambient,
            is_long: m.is_long,
            budget_ms: m.budget_ms,
            roi: m.roi,
        }
    }
}

/// Native calls for the laser rangefinder family.
pub trait RangingDriver: HandleDriver {
    /// Latest cached measurement frame, or `None` if there is no fresh one.
    fn measurement(&self, handle: RawHandle) -> Option<RawMeasurement>;

    fn set_ranging_mode(&self, handle: RawHandle, is_long: bool) -> DriverResult<()>;

    fn set_timing_budget(&self, handle: RawHandle, budget_ms: u8) -> DriverResult<()>;

    fn set_roi(&self, handle: RawHandle, x: u8, y: u8, w: u8, h: u8) -> DriverResult<()>;
}

/// Native calls for the voltage regulator family.
///
/// Channel indices passed here are always in range; the host rejects invalid
/// channels before calling. `Ok(None)` means the device has not reported yet.
pub trait RegulatorDriver: HandleDriver {
    /// Current draw in amperes.
    fn channel_current(&self, handle: RawHandle, channel: u8) -> DriverResult<Option<f64>>;

    /// Output voltage in volts.
    fn channel_voltage(&self, handle: RawHandle, channel: u8) -> DriverResult<Option<f64>>;

    /// Voltage setpoint in volts.
    fn channel_voltage_setpoint(&self, handle: RawHandle, channel: u8)
    -> DriverResult<Option<f64>>;

    fn channel_enabled(&self, handle: RawHandle, channel: u8) -> DriverResult<Option<bool>>;

    fn set_channel_enabled(&self, handle: RawHandle, channel: u8, enabled: bool)
    -> DriverResult<()>;

    /// Set the rail voltage. The device disables the channel as it applies it.
    fn set_channel_voltage(&self, handle: RawHandle, channel: u8, volts: f64) -> DriverResult<()>;
}

/// A loaded native driver: one implementation per device family.
#[derive(Clone)]
pub struct DriverBackend {
    name: String,
    ranging: Arc<dyn RangingDriver>,
    regulator: Arc<dyn RegulatorDriver>,
}

impl DriverBackend {
    /// Bundle the per-family drivers under a display name.
    pub fn new(
        name: impl Into<String>,
        ranging: Arc<dyn RangingDriver>,
        regulator: Arc<dyn RegulatorDriver>,
    ) -> Self {
        Self {
            name: name.into(),
            ranging,
            regulator,
        }
    }

    /// Display name of the backend.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver for rangefinders.
    pub fn ranging(&self) -> Arc<dyn RangingDriver> {
        Arc::clone(&self.ranging)
    }

    /// Driver for regulators.
    pub fn regulator(&self) -> Arc<dyn RegulatorDriver> {
        Arc::clone(&self.regulator)
    }
}

impl fmt::Debug for DriverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverBackend")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
