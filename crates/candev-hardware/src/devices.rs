//! Enum wrappers for device dispatch.
//!
//! Each device family has exactly two implementations. Application code that
//! owns a device without caring which one it is holds the matching `Any*`
//! enum, which forwards every trait call to the wrapped variant.
//!
//! # Examples
//!
//! ```
//! use candev_hardware::devices::AnyRangingDevice;
//! use candev_hardware::mock::MockRangefinder;
//! use candev_hardware::traits::RangingDevice;
//!
//! let sensor = AnyRangingDevice::Mock(MockRangefinder::new());
//! assert!(sensor.get_measurement().is_none());
//! assert!(sensor.is_mock());
//! ```

use crate::mock::{MockRangefinder, MockRegulator};
use crate::proxy::{LaserRangefinder, VoltageRegulator};
use crate::traits::{RangingDevice, RegulatorDevice};
use candev_core::{
    ChannelId, ChannelReading, ConfigError, EnabledState, Measurement, QueryError, RangingMode,
    RegionOfInterest, TimingBudget,
};

/// A rangefinder of either kind.
#[derive(Debug)]
pub enum AnyRangingDevice {
    /// Sensor on the CAN bus.
    Hardware(LaserRangefinder),

    /// In-memory sensor for simulation and tests.
    Mock(MockRangefinder),
}

impl AnyRangingDevice {
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock(_))
    }

    /// Release the native handle, if there is one.
    pub fn close(self) {
        if let Self::Hardware(device) = self {
            device.close();
        }
    }
}

impl RangingDevice for AnyRangingDevice {
    fn get_measurement(&self) -> Option<Measurement> {
        match self {
            Self::Hardware(device) => device.get_measurement(),
            Self::Mock(device) => device.get_measurement(),
        }
    }

    fn set_ranging_mode(&mut self, mode: RangingMode) -> Result<(), ConfigError> {
        match self {
            Self::Hardware(device) => device.set_ranging_mode(mode),
            Self::Mock(device) => device.set_ranging_mode(mode),
        }
    }

    fn set_timing_budget(&mut self, budget: TimingBudget) -> Result<(), ConfigError> {
        match self {
            Self::Hardware(device) => device.set_timing_budget(budget),
            Self::Mock(device) => device.set_timing_budget(budget),
        }
    }

    fn set_region_of_interest(&mut self, roi: RegionOfInterest) -> Result<(), ConfigError> {
        match self {
            Self::Hardware(device) => device.set_region_of_interest(roi),
            Self::Mock(device) => device.set_region_of_interest(roi),
        }
    }
}

/// A voltage regulator of either kind.
#[derive(Debug)]
pub enum AnyRegulatorDevice {
    /// Regulator on the CAN bus.
    Hardware(VoltageRegulator),

    /// In-memory regulator for simulation and tests.
    Mock(MockRegulator),
}

impl AnyRegulatorDevice {
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock(_))
    }

    /// Release the native handle, if there is one.
    pub fn close(self) {
        if let Self::Hardware(device) = self {
            device.close();
        }
    }
}

impl RegulatorDevice for AnyRegulatorDevice {
    fn get_channel_current(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        match self {
            Self::Hardware(device) => device.get_channel_current(channel),
            Self::Mock(device) => device.get_channel_current(channel),
        }
    }

    fn get_channel_voltage(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        match self {
            Self::Hardware(device) => device.get_channel_voltage(channel),
            Self::Mock(device) => device.get_channel_voltage(channel),
        }
    }

    fn get_channel_voltage_setpoint(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        match self {
            Self::Hardware(device) => device.get_channel_voltage_setpoint(channel),
            Self::Mock(device) => device.get_channel_voltage_setpoint(channel),
        }
    }

    fn get_channel_enabled(&self, channel: ChannelId) -> Result<Option<EnabledState>, QueryError> {
        match self {
            Self::Hardware(device) => device.get_channel_enabled(channel),
            Self::Mock(device) => device.get_channel_enabled(channel),
        }
    }

    fn set_channel_enabled(
        &mut self,
        channel: ChannelId,
        enabled: bool,
    ) -> Result<(), ConfigError> {
        match self {
            Self::Hardware(device) => device.set_channel_enabled(channel, enabled),
            Self::Mock(device) => device.set_channel_enabled(channel, enabled),
        }
    }

    fn set_channel_voltage(&mut self, channel: ChannelId, volts: f64) -> Result<(), ConfigError> {
        match self {
            Self::Hardware(device) => device.set_channel_voltage(channel, volts),
            Self::Mock(device) => device.set_channel_voltage(channel, volts),
        }
    }

    fn channel_reading(&self, channel: ChannelId) -> Result<ChannelReading, QueryError> {
        match self {
            Self::Hardware(device) => device.channel_reading(channel),
            Self::Mock(device) => device.channel_reading(channel),
        }
    }
}
