//! Hardware-backed voltage regulator.

use crate::bootstrap;
use crate::driver::{DriverBackend, RegulatorDriver};
use crate::error::BootstrapError;
use crate::handle::{HandleState, NativeHandle};
use crate::traits::{RegulatorDevice, ensure_adjustable};
use candev_core::{ChannelId, ConfigError, EnabledState, QueryError};

/// Five-channel voltage regulator on the CAN bus.
///
/// Every call forwards to the native driver; nothing is cached on the host.
///
/// # Examples
///
/// ```
/// use candev_hardware::proxy::VoltageRegulator;
/// use candev_hardware::sim::SimDriver;
/// use candev_hardware::traits::RegulatorDevice;
/// use candev_core::ChannelId;
///
/// let backend = SimDriver::new().into_backend();
/// let pdh = VoltageRegulator::with_backend(&backend, 0);
///
/// // The regulator has not reported yet.
/// assert_eq!(pdh.get_channel_current(ChannelId::FiveVA).unwrap(), None);
/// ```
#[derive(Debug)]
pub struct VoltageRegulator {
    handle: NativeHandle<dyn RegulatorDriver>,
}

impl VoltageRegulator {
    /// Create a regulator using the process-wide native driver.
    ///
    /// Loads the driver on first use. If it cannot be loaded the process
    /// exits; use [`try_new`](Self::try_new) to handle that yourself.
    pub fn new(can_id: u8) -> Self {
        Self::with_backend(bootstrap::backend_or_exit(), can_id)
    }

    /// Create a regulator using the process-wide native driver.
    ///
    /// # Errors
    ///
    /// Returns the bootstrap failure if the driver cannot be loaded.
    pub fn try_new(can_id: u8) -> Result<Self, BootstrapError> {
        Ok(Self::with_backend(bootstrap::backend()?, can_id))
    }

    /// Create a regulator on an explicit backend.
    pub fn with_backend(backend: &DriverBackend, can_id: u8) -> Self {
        Self {
            handle: NativeHandle::acquire(backend.regulator(), can_id),
        }
    }

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

impl RegulatorDevice for VoltageRegulator {
    fn get_channel_current(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        Ok(self
            .handle
            .driver()
            .channel_current(self.handle.raw(), channel.index())?)
    }

    fn get_channel_voltage(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        Ok(self
            .handle
            .driver()
            .channel_voltage(self.handle.raw(), channel.index())?)
    }

    fn get_channel_voltage_setpoint(&self, channel: ChannelId) -> Result<Option<f64>, QueryError> {
        Ok(self
            .handle
            .driver()
            .channel_voltage_setpoint(self.handle.raw(), channel.index())?)
    }

    fn get_channel_enabled(&self, channel: ChannelId) -> Result<Option<EnabledState>, QueryError> {
        let enabled = self
            .handle
            .driver()
            .channel_enabled(self.handle.raw(), channel.index())?;
        Ok(enabled.map(EnabledState::from))
    }

    fn set_channel_enabled(
        &mut self,
        channel: ChannelId,
        enabled: bool,
    ) -> Result<(), ConfigError> {
        self.handle
            .driver()
            .set_channel_enabled(self.handle.raw(), channel.index(), enabled)?;
        Ok(())
    }

    fn set_channel_voltage(&mut self, channel: ChannelId, volts: f64) -> Result<(), ConfigError> {
        ensure_adjustable(channel)?;
        self.handle
            .driver()
            .set_channel_voltage(self.handle.raw(), channel.index(), volts)?;
        Ok(())
    }
}
