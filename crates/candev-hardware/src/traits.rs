//! Capability interfaces for each device family.
//!
//! Application code depends on these traits only. Each family has exactly
//! two implementations: a hardware-backed proxy that forwards to the native
//! driver, and an in-memory mock for simulation and tests. Both return the
//! same errors for the same inputs, so one can be swapped for the other
//! without changing behavior.
//!
//! None of the methods block waiting on the bus: reads return the most recent
//! cached value and writes dispatch a short request to the native layer.
//!
//! The traits are object-safe, so both generics and `&mut dyn RangingDevice`
//! work. For owning storage of either variant use the enum wrappers in
//! [`devices`](crate::devices).

use candev_core::{
    ChannelId, ChannelReading, ConfigError, EnabledState, Measurement, QueryError, RangingMode,
    RegionOfInterest, TimingBudget,
};

/// Laser rangefinder.
///
/// # Examples
///
/// ```
/// use candev_hardware::traits::RangingDevice;
/// use candev_core::{RangingMode, TimingBudget, RegionOfInterest, ConfigError};
///
/// fn configure<R: RangingDevice>(sensor: &mut R) -> Result<(), ConfigError> {
///     sensor.set_ranging_mode(RangingMode::Short)?;
///     sensor.set_region_of_interest(RegionOfInterest::new(8, 8, 16, 16))?;
///     sensor.set_timing_budget(TimingBudget::Ms33)?;
///     Ok(())
/// }
///
/// fn distance<R: RangingDevice>(sensor: &R) -> Option<u16> {
///     sensor.get_measurement()?.valid_distance_mm()
/// }
/// ```
pub trait RangingDevice: Send + Sync {
    /// Most recent measurement, or `None` if none has arrived.
    ///
    /// Never waits for the bus and has no side effects.
    fn get_measurement(&self) -> Option<Measurement>;

    /// Select long or short ranging.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure, unmodified. Safe to resend.
    fn set_ranging_mode(&mut self, mode: RangingMode) -> Result<(), ConfigError>;

    /// Select the integration window.
    ///
    /// Every budget is valid regardless of ranging mode.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure, unmodified. Safe to resend.
    fn set_timing_budget(&mut self, budget: TimingBudget) -> Result<(), ConfigError>;

    /// Replace the region of interest. Partial updates are not supported.
    ///
    /// # Errors
    ///
    /// Returns `ParamOutOfBounds` if the device rejects the region, or any
    /// other driver failure, unmodified. Safe to resend.
    fn set_region_of_interest(&mut self, roi: RegionOfInterest) -> Result<(), ConfigError>;
}

/// Five-channel voltage regulator.
///
/// Getters return `Ok(None)` until the device has reported the value.
///
/// # Examples
///
/// ```
/// use candev_hardware::traits::RegulatorDevice;
/// use candev_core::{ChannelId, ConfigError};
///
/// fn set_camera_rail<R: RegulatorDevice>(pdh: &mut R, volts: f64) -> Result<(), ConfigError> {
///     // Setting the voltage disables the rail; turn it back on explicitly.
///     pdh.set_channel_voltage(ChannelId::Adjustable, volts)?;
///     pdh.set_channel_enabled(ChannelId::Adjustable, true)
/// }
/// ```
pub trait RegulatorDevice: Send + Sync {
    /// Current draw of a channel, in amperes.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure, unmodified.
    fn get_channel_current(&self, channel: ChannelId) -> Result<Option<f64>, QueryError>;

    /// Output voltage of a channel, in volts.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure, unmodified.
    fn get_channel_voltage(&self, channel: ChannelId) -> Result<Option<f64>, QueryError>;

    /// Voltage setpoint of a channel, in volts.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure, unmodified.
    fn get_channel_voltage_setpoint(&self, channel: ChannelId) -> Result<Option<f64>, QueryError>;

    /// Whether a channel is energised.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure, unmodified.
    fn get_channel_enabled(&self, channel: ChannelId) -> Result<Option<EnabledState>, QueryError>;

    /// Energise or de-energise a channel.
    ///
    /// # Errors
    ///
    /// Returns the driver's failure, unmodified. Safe to resend.
    fn set_channel_enabled(&mut self, channel: ChannelId, enabled: bool)
    -> Result<(), ConfigError>;

    /// Set the voltage of the adjustable channel.
    ///
    /// Applying a voltage also disables the channel; it must be re-enabled
    /// with [`set_channel_enabled`](Self::set_channel_enabled).
    ///
    /// # Errors
    ///
    /// Always returns `ParamOutOfBounds` for any channel other than
    /// `ChannelId::Adjustable`, without touching the device. Otherwise
    /// returns the driver's failure, unmodified.
    fn set_channel_voltage(&mut self, channel: ChannelId, volts: f64) -> Result<(), ConfigError>;

    /// Everything known about one channel, read in one go.
    ///
    /// # Errors
    ///
    /// Returns the first failing query.
    fn channel_reading(&self, channel: ChannelId) -> Result<ChannelReading, QueryError> {
        Ok(ChannelReading {
            current: self.get_channel_current(channel)?,
            voltage: self.get_channel_voltage(channel)?,
            voltage_setpoint: self.get_channel_voltage_setpoint(channel)?,
            enabled: self.get_channel_enabled(channel)?,
        })
    }
}

/// Reject a voltage write aimed at a fixed rail.
///
/// Shared by both regulator implementations so they fail identically.
pub(crate) fn ensure_adjustable(channel: ChannelId) -> Result<(), ConfigError> {
    if channel.is_adjustable() {
        Ok(())
    } else {
        Err(ConfigError::new(
            candev_core::ErrorCode::ParamOutOfBounds,
            format!("Cannot set voltage on channel {channel}; only the adjustable channel accepts a setpoint"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candev_core::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(ChannelId::Usb1)]
    #[case(ChannelId::Usb2)]
    #[case(ChannelId::FiveVA)]
    #[case(ChannelId::FiveVB)]
    fn test_fixed_rails_rejected(#[case] channel: ChannelId) {
        let err = ensure_adjustable(channel).unwrap_err();
        assert_eq!(err.kind(), ErrorCode::ParamOutOfBounds);
    }

    #[test]
    fn test_adjustable_rail_accepted() {
        assert!(ensure_adjustable(ChannelId::Adjustable).is_ok());
    }
}
