//! In-process simulated native driver.
//!
//! `SimDriver` implements every driver trait against in-memory device state
//! and reproduces the firmware-facing rules the real driver enforces:
//!
//! - cached frames expire [`FRAME_STALE_AFTER`] after they were received;
//! - a regulator is offline until its first status frame, and rejects writes
//!   while offline;
//! - `USB1`/`USB2` are always on, only `5VA`/`5VB`/`ADJ` can be switched,
//!   only `ADJ` accepts a voltage, and applying a voltage disables the rail;
//! - a region of interest is validated against the sensor's field.
//!
//! Tests and the CLI drive the simulated bus through the `publish_*` and
//! `set_*` injectors, and can make the next write to a device fail.

use crate::driver::{
    DriverBackend, DriverResult, HandleDriver, RangingDriver, RawHandle, RawMeasurement,
    RegulatorDriver,
};
use crate::error::BootstrapError;
use candev_core::constants::{
    CHANNEL_COUNT, FRAME_STALE_AFTER, MAX_ADJUSTABLE_VOLTAGE, MAX_ROI_COORDINATE, MAX_ROI_SIZE,
    MIN_ROI_SIZE, NOMINAL_RAIL_VOLTAGE,
};
use candev_core::{ChannelId, DeviceError, RegionOfInterest, TimingBudget};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Display name of the simulated backend.
pub const BACKEND_NAME: &str = "sim";

/// Loader for [`register_loader`](crate::bootstrap::register_loader).
///
/// # Errors
///
/// Never fails; the signature matches [`BackendLoader`](crate::bootstrap::BackendLoader).
pub fn load_backend() -> Result<DriverBackend, BootstrapError> {
    Ok(SimDriver::new().into_backend())
}

/// Handle bookkeeping counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Handles issued by `init`.
    pub inits: usize,

    /// Handles freed successfully.
    pub frees: usize,

    /// `free` calls for a handle that was unknown or already freed.
    pub rejected_frees: usize,

    /// Handles issued and not yet freed.
    pub live_handles: usize,

    /// `set_channel_voltage` calls that reached the driver.
    pub voltage_writes: usize,
}

/// Configuration last written to a simulated rangefinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimRangefinderConfig {
    pub is_long: bool,
    pub budget_ms: u8,
    pub roi: RegionOfInterest,
}

impl Default for SimRangefinderConfig {
    fn default() -> Self {
        Self {
            is_long: false,
            budget_ms: TimingBudget::default().as_millis(),
            roi: RegionOfInterest::default(),
        }
    }
}

#[derive(Debug, Default)]
struct SimRangefinder {
    config: SimRangefinderConfig,
    frame: Option<(RawMeasurement, Instant)>,
}

#[derive(Debug, Clone, Copy)]
struct SimChannel {
    current: f64,
    voltage: f64,
    setpoint: f64,
    enabled: bool,
}

impl Default for SimChannel {
    fn default() -> Self {
        Self {
            current: 0.0,
            voltage: 0.0,
            setpoint: NOMINAL_RAIL_VOLTAGE,
            enabled: false,
        }
    }
}

#[derive(Debug, Default)]
struct SimRegulator {
    last_status: Option<Instant>,
    channels: [SimChannel; CHANNEL_COUNT],
}

/// Device family a simulated write is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    Ranging,
    Regulator,
}

#[derive(Debug, Default)]
struct SimState {
    next_token: u64,
    /// Live handles and the CAN id each was issued for.
    handles: HashMap<RawHandle, u8>,
    stats: SimStats,
    rangefinders: HashMap<u8, SimRangefinder>,
    regulators: HashMap<u8, SimRegulator>,
    pending_failures: HashMap<(Family, u8), DeviceError>,
}

impl SimState {
    fn can_id(&self, handle: RawHandle) -> DriverResult<u8> {
        self.handles
            .get(&handle)
            .copied()
            .ok_or_else(|| DeviceError::generic(format!("unknown handle {handle}")))
    }

    /// Consume an injected failure for the device, if any.
    fn take_failure(&mut self, family: Family, can_id: u8) -> DriverResult<()> {
        match self.pending_failures.remove(&(family, can_id)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Simulated native driver for both device families.
#[derive(Debug)]
pub struct SimDriver {
    state: Mutex<SimState>,
    stale_after: Duration,
}

impl SimDriver {
    /// Create an empty simulated bus.
    pub fn new() -> Self {
        Self::with_stale_after(FRAME_STALE_AFTER)
    }

    /// Create a simulated bus with a custom frame expiry.
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            stale_after,
        }
    }

    /// Wrap the driver in a backend serving both device families.
    pub fn into_backend(self) -> DriverBackend {
        Arc::new(self).backend()
    }

    /// A backend sharing this driver, so the caller keeps access to the
    /// injectors.
    pub fn backend(self: &Arc<Self>) -> DriverBackend {
        let ranging: Arc<dyn RangingDriver> = Arc::clone(self) as Arc<dyn RangingDriver>;
        let regulator: Arc<dyn RegulatorDriver> = Arc::clone(self) as Arc<dyn RegulatorDriver>;
        DriverBackend::new(BACKEND_NAME, ranging, regulator)
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, received: Instant) -> bool {
        received.elapsed() < self.stale_after
    }

    // ------------------------------------------------------------------------
    // Bus injectors
    // ------------------------------------------------------------------------

    /// Deliver a measurement frame from the rangefinder at `can_id`.
    pub fn publish_measurement(&self, can_id: u8, frame: RawMeasurement) {
        let mut state = self.lock();
        state.rangefinders.entry(can_id).or_default().frame = Some((frame, Instant::now()));
    }

    /// Deliver a status frame from the regulator at `can_id`, bringing it
    /// online.
    pub fn publish_regulator_status(&self, can_id: u8) {
        let mut state = self.lock();
        state.regulators.entry(can_id).or_default().last_status = Some(Instant::now());
    }

    /// Set the current draw the regulator will report on a channel.
    pub fn set_channel_current(&self, can_id: u8, channel: ChannelId, amps: f64) {
        let mut state = self.lock();
        state.regulators.entry(can_id).or_default().channels[usize::from(channel.index())]
            .current = amps;
    }

    /// Set the output voltage the regulator will report on the adjustable
    /// channel. Fixed rails always report the nominal voltage.
    pub fn set_channel_voltage_reading(&self, can_id: u8, volts: f64) {
        let mut state = self.lock();
        state.regulators.entry(can_id).or_default().channels
            [usize::from(ChannelId::Adjustable.index())]
        .voltage = volts;
    }

    /// Make the next write to the rangefinder at `can_id` fail with `err`.
    pub fn fail_next_ranging_write(&self, can_id: u8, err: DeviceError) {
        self.lock()
            .pending_failures
            .insert((Family::Ranging, can_id), err);
    }

    /// Make the next write to the regulator at `can_id` fail with `err`.
    pub fn fail_next_regulator_write(&self, can_id: u8, err: DeviceError) {
        self.lock()
            .pending_failures
            .insert((Family::Regulator, can_id), err);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// Handle bookkeeping counters.
    pub fn stats(&self) -> SimStats {
        self.lock().stats
    }

    /// Configuration last written to the rangefinder at `can_id`.
    pub fn rangefinder_config(&self, can_id: u8) -> Option<SimRangefinderConfig> {
        self.lock().rangefinders.get(&can_id).map(|r| r.config)
    }

    fn regulator_read<T>(
        &self,
        handle: RawHandle,
        channel: u8,
        read: impl FnOnce(ChannelId, &SimChannel) -> T,
    ) -> DriverResult<Option<T>> {
        let channel = ChannelId::from_index(channel)?;
        let state = self.lock();
        let can_id = state.can_id(handle)?;

        let Some(regulator) = state.regulators.get(&can_id) else {
            return Ok(None);
        };
        match regulator.last_status {
            Some(received) if self.is_fresh(received) => Ok(Some(read(
                channel,
                &regulator.channels[usize::from(channel.index())],
            ))),
            _ => Ok(None),
        }
    }

    fn regulator_write(
        &self,
        handle: RawHandle,
        channel: u8,
        write: impl FnOnce(ChannelId, &mut SimChannel) -> DriverResult<()>,
    ) -> DriverResult<()> {
        let channel = ChannelId::from_index(channel)?;
        let mut state = self.lock();
        let can_id = state.can_id(handle)?;
        state.take_failure(Family::Regulator, can_id)?;

        let regulator = state.regulators.entry(can_id).or_default();
        let online = regulator
            .last_status
            .is_some_and(|received| self.is_fresh(received));
        if !online {
            return Err(DeviceError::failed_assertion(format!(
                "regulator {can_id} is offline"
            )));
        }
        write(channel, &mut regulator.channels[usize::from(channel.index())])
    }

    fn ranging_write(
        &self,
        handle: RawHandle,
        write: impl FnOnce(&mut SimRangefinderConfig),
    ) -> DriverResult<()> {
        let mut state = self.lock();
        let can_id = state.can_id(handle)?;
        state.take_failure(Family::Ranging, can_id)?;

        write(&mut state.rangefinders.entry(can_id).or_default().config);
        Ok(())
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles are shared by both families; device state is looked up per family
/// by the CAN id a handle was issued for.
impl HandleDriver for SimDriver {
    fn init(&self, can_id: u8) -> RawHandle {
        let mut state = self.lock();
        state.next_token += 1;
        let handle = RawHandle::new(state.next_token);

        state.handles.insert(handle, can_id);
        state.stats.inits += 1;
        state.stats.live_handles += 1;

        debug!(can_id, handle = %handle, "Simulated device initialised");
        handle
    }

    fn free(&self, handle: RawHandle) {
        let mut state = self.lock();
        if state.handles.remove(&handle).is_some() {
            state.stats.frees += 1;
            state.stats.live_handles -= 1;
        } else {
            state.stats.rejected_frees += 1;
            error!(handle = %handle, "Free of unknown or already freed handle");
        }
    }
}

impl RangingDriver for SimDriver {
    fn measurement(&self, handle: RawHandle) -> Option<RawMeasurement> {
        let state = self.lock();
        let can_id = state.can_id(handle).ok()?;
        let (frame, received) = state.rangefinders.get(&can_id)?.frame?;
        self.is_fresh(received).then_some(frame)
    }

    fn set_ranging_mode(&self, handle: RawHandle, is_long: bool) -> DriverResult<()> {
        self.ranging_write(handle, |config| config.is_long = is_long)
    }

    fn set_timing_budget(&self, handle: RawHandle, budget_ms: u8) -> DriverResult<()> {
        TimingBudget::from_millis(budget_ms)?;
        self.ranging_write(handle, |config| config.budget_ms = budget_ms)
    }

    fn set_roi(&self, handle: RawHandle, x: u8, y: u8, w: u8, h: u8) -> DriverResult<()> {
        let size_ok = (MIN_ROI_SIZE..=MAX_ROI_SIZE).contains(&w)
            && (MIN_ROI_SIZE..=MAX_ROI_SIZE).contains(&h);
        if !size_ok || x > MAX_ROI_COORDINATE || y > MAX_ROI_COORDINATE {
            return Err(DeviceError::param_out_of_bounds(format!(
                "region of interest {w}x{h}@({x},{y}) is outside the sensor field"
            )));
        }
        self.ranging_write(handle, |config| {
            config.roi = RegionOfInterest::new(x, y, w, h);
        })
    }
}

impl RegulatorDriver for SimDriver {
    fn channel_current(&self, handle: RawHandle, channel: u8) -> DriverResult<Option<f64>> {
        self.regulator_read(handle, channel, |_, ch| ch.current)
    }

    fn channel_voltage(&self, handle: RawHandle, channel: u8) -> DriverResult<Option<f64>> {
        self.regulator_read(handle, channel, |id, ch| {
            if id.is_adjustable() {
                ch.voltage
            } else {
                NOMINAL_RAIL_VOLTAGE
            }
        })
    }

    fn channel_voltage_setpoint(
        &self,
        handle: RawHandle,
        channel: u8,
    ) -> DriverResult<Option<f64>> {
        self.regulator_read(handle, channel, |id, ch| {
            if id.is_adjustable() {
                ch.setpoint
            } else {
                NOMINAL_RAIL_VOLTAGE
            }
        })
    }

    fn channel_enabled(&self, handle: RawHandle, channel: u8) -> DriverResult<Option<bool>> {
        self.regulator_read(handle, channel, |id, ch| {
            matches!(id, ChannelId::Usb1 | ChannelId::Usb2) || ch.enabled
        })
    }

    fn set_channel_enabled(
        &self,
        handle: RawHandle,
        channel: u8,
        enabled: bool,
    ) -> DriverResult<()> {
        self.regulator_write(handle, channel, |id, ch| {
            if matches!(id, ChannelId::Usb1 | ChannelId::Usb2) {
                return Err(DeviceError::failed_assertion(format!(
                    "channel {id} is not switchable"
                )));
            }
            ch.enabled = enabled;
            Ok(())
        })
    }

    fn set_channel_voltage(&self, handle: RawHandle, channel: u8, volts: f64) -> DriverResult<()> {
        self.lock().stats.voltage_writes += 1;

        self.regulator_write(handle, channel, |id, ch| {
            if !(0.0..=MAX_ADJUSTABLE_VOLTAGE).contains(&volts) {
                return Err(DeviceError::param_out_of_bounds(format!(
                    "voltage {volts} V is outside 0..={MAX_ADJUSTABLE_VOLTAGE} V"
                )));
            }
            if !id.is_adjustable() {
                return Err(DeviceError::failed_assertion(format!(
                    "channel {id} is not adjustable"
                )));
            }
            // Carried on the bus as whole millivolts.
            ch.setpoint = (volts * 1000.0).round() / 1000.0;
            ch.enabled = false;
            Ok(())
        })
    }
}
