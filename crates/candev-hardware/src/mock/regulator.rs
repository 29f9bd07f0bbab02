//! Mock voltage regulator.

use crate::traits::{RegulatorDevice, ensure_adjustable};
use candev_core::constants::CHANNEL_COUNT;
use candev_core::{ChannelId, ChannelReading, ConfigError, EnabledState, QueryError};

/// In-memory five-channel regulator.
///
/// Every field of every channel starts unknown, except the setpoint of the
/// fixed rails which reads as the nominal 5.0 V. Voltage writes follow the
/// same rules as the real device: only the adjustable rail accepts one, and
/// applying it disables the rail.
///
/// # Examples
///
/// ```
/// use candev_hardware::mock::MockRegulator;
/// use candev_hardware::traits::RegulatorDevice;
/// use candev_core::ChannelId;
///
/// let mut pdh = MockRegulator::new();
/// assert_eq!(pdh.get_channel_voltage_setpoint(ChannelId::Usb1).unwrap(), Some(5.0));
/// assert_eq!(pdh.get_channel_voltage_setpoint(ChannelId::Adjustable).unwrap(), None);
///
/// pdh.set_channel_current_sim(ChannelId::Usb1, 1.25);
/// assert_eq!(pdh.get_channel_current(ChannelId::Usb1).unwrap(), Some(1.25));
/// ```
#[derive(Debug, Clone)]
pub struct MockRegulator {
    channels: [ChannelReading; CHANNEL_COUNT],
}

impl MockRegulator {
    pub fn new() -> Self {
        Self {
            channels: ChannelId::ALL.map(ChannelReading::initial),
        }
    }

    fn channel(&self, channel: ChannelId) -> &ChannelReading {
        &self.channels[usize::from(channel.index())]
    }

    fn channel_mut(&mut self, channel: ChannelId) -> &mut ChannelReading {
        &mut self.channels[usize::from(channel.index())]
    }

    /// Set the current draw reported on a channel.
    pub fn set_channel_current_sim(&mut self, channel: ChannelId, amps: f64) {
        self.channel_mut(channel).current = Some(amps);
    }

    /// Set the output voltage reported on a channel.
    pub fn set_channel_voltage_sim(&mut self, channel: ChannelId, volts: f64) {
        self.channel_mut(channel).voltage = Some(volts);
    }
}

impl Default for MockRegulator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegulatorDevice for MockRegulator {
    fn get_channel_current(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        Ok(self.channel(channel).current)
    }

    fn get_channel_voltage(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        Ok(self.channel(channel).voltage)
    }

    fn get_channel_voltage_setpoint(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        Ok(self.channel(channel).voltage_setpoint)
    }

    fn get_channel_enabled(&self, channel: ChannelId) -> Result<Option<EnabledState>, QueryError> {
        Ok(self.channel(channel).enabled)
    }

    fn set_channel_enabled(
        &mut self,
        channel: ChannelId,
        enabled: bool,
    ) -> Result<(), ConfigError> {
        self.channel_mut(channel).enabled = Some(enabled.into());
        Ok(())
    }

    fn set_channel_voltage(&mut self, channel: ChannelId, volts: f64) -> Result<(), ConfigError> {
        ensure_adjustable(channel)?;

        let state = self.channel_mut(channel);
        state.voltage_setpoint = Some(volts);
        state.enabled = Some(EnabledState::Disabled);
        Ok(())
    }

    fn channel_reading(&self, channel: ChannelId) -> Result<ChannelReading, QueryError> {
        Ok(*self.channel(channel))
    }
}
