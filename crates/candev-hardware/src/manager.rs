//! Configuration-driven device manager.
//!
//! The `DeviceManager` builds every device listed in a [`BusConfig`], applies
//! its initial configuration, and owns the devices until [`shutdown`]. With
//! `simulation` enabled it builds mocks instead of hardware-backed proxies,
//! so the same configuration drives a robot and its test bench.
//!
//! ```text
//! BusConfig ──► DeviceManager::build ──► AnyRangingDevice / AnyRegulatorDevice
//!                      │                          │
//!                      └── initial config ────────┘ (resent on failure)
//! ```
//!
//! # Examples
//!
//! ```
//! use candev_hardware::manager::{BusConfig, DeviceManager};
//! use candev_hardware::traits::RangingDevice;
//!
//! let config = BusConfig::from_json_str(r#"{
//!     "simulation": true,
//!     "rangefinders": [
//!         { "name": "front", "can_id": 0, "ranging_mode": "Short", "timing_budget": "33ms" }
//!     ]
//! }"#)?;
//!
//! let manager = DeviceManager::build(config, None)?;
//! let front = manager.rangefinder("front").unwrap();
//! assert!(front.get_measurement().is_none());
//!
//! manager.shutdown();
//! # Ok::<(), candev_hardware::HardwareError>(())
//! ```
//!
//! [`shutdown`]: DeviceManager::shutdown

use crate::devices::{AnyRangingDevice, AnyRegulatorDevice};
use crate::driver::DriverBackend;
use crate::mock::{MockRangefinder, MockRegulator};
use crate::proxy::{LaserRangefinder, VoltageRegulator};
use crate::traits::{RangingDevice, RegulatorDevice};
use crate::{HardwareError, Result};
use candev_core::constants::{DEFAULT_CONFIG_RETRIES, DEFAULT_CONFIG_RETRY_DELAY_MS};
use candev_core::{
    ChannelId, ChannelReading, ConfigError, ErrorCode, Measurement, RangingMode,
    RegionOfInterest, TimingBudget,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Family of a managed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Rangefinder,
    Regulator,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rangefinder => write!(f, "Rangefinder"),
            Self::Regulator => write!(f, "Regulator"),
        }
    }
}

/// One rangefinder on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangefinderConfig {
    /// Unique device name.
    pub name: String,

    pub can_id: u8,

    /// Initial ranging mode; left as the device has it when absent.
    #[serde(default)]
    pub ranging_mode: Option<RangingMode>,

    /// Initial timing budget; left as the device has it when absent.
    #[serde(default)]
    pub timing_budget: Option<TimingBudget>,

    /// Initial region of interest; left as the device has it when absent.
    #[serde(default)]
    pub roi: Option<RegionOfInterest>,
}

impl RangefinderConfig {
    /// A rangefinder with no initial configuration.
    pub fn new(name: impl Into<String>, can_id: u8) -> Self {
        Self {
            name: name.into(),
            can_id,
            ranging_mode: None,
            timing_budget: None,
            roi: None,
        }
    }

    pub fn with_ranging_mode(mut self, mode: RangingMode) -> Self {
        self.ranging_mode = Some(mode);
        self
    }

    pub fn with_timing_budget(mut self, budget: TimingBudget) -> Self {
        self.timing_budget = Some(budget);
        self
    }

    pub fn with_roi(mut self, roi: RegionOfInterest) -> Self {
        self.roi = Some(roi);
        self
    }
}

/// One voltage regulator on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatorConfig {
    /// Unique device name.
    pub name: String,

    pub can_id: u8,

    /// Voltage to apply to the adjustable rail, in volts.
    #[serde(default)]
    pub adjustable_voltage: Option<f64>,

    /// Channels to energise once the voltage is applied.
    #[serde(default)]
    pub enabled_channels: Vec<ChannelId>,
}

impl RegulatorConfig {
    /// A regulator with no initial configuration.
    pub fn new(name: impl Into<String>, can_id: u8) -> Self {
        Self {
            name: name.into(),
            can_id,
            adjustable_voltage: None,
            enabled_channels: Vec::new(),
        }
    }

    pub fn with_adjustable_voltage(mut self, volts: f64) -> Self {
        self.adjustable_voltage = Some(volts);
        self
    }

    pub fn with_enabled_channel(mut self, channel: ChannelId) -> Self {
        self.enabled_channels.push(channel);
        self
    }
}

fn default_config_retries() -> u32 {
    DEFAULT_CONFIG_RETRIES
}

fn default_config_retry_delay_ms() -> u64 {
    DEFAULT_CONFIG_RETRY_DELAY_MS
}

/// Every device on one CAN bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Build mocks instead of hardware-backed proxies.
    #[serde(default)]
    pub simulation: bool,

    /// Attempts per configuration write before giving up.
    #[serde(default = "default_config_retries")]
    pub config_retries: u32,

    /// Pause between attempts, in milliseconds.
    #[serde(default = "default_config_retry_delay_ms")]
    pub config_retry_delay_ms: u64,

    #[serde(default)]
    pub rangefinders: Vec<RangefinderConfig>,

    #[serde(default)]
    pub regulators: Vec<RegulatorConfig>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            simulation: false,
            config_retries: DEFAULT_CONFIG_RETRIES,
            config_retry_delay_ms: DEFAULT_CONFIG_RETRY_DELAY_MS,
            rangefinders: Vec::new(),
            regulators: Vec::new(),
        }
    }
}

impl BusConfig {
    /// Parse and validate a JSON bus configuration.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Parse` for malformed JSON and
    /// `HardwareError::InvalidConfig` if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON bus configuration file.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Io` if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that the configuration can be built.
    ///
    /// Names must be unique across the bus, CAN ids unique within a device
    /// family, and at least one attempt must be allowed per write.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InvalidConfig` describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.config_retries == 0 {
            return Err(HardwareError::invalid_config(
                "config_retries must be at least 1",
            ));
        }

        let mut names = HashSet::new();
        let all_names = self
            .rangefinders
            .iter()
            .map(|r| &r.name)
            .chain(self.regulators.iter().map(|r| &r.name));
        for name in all_names {
            if name.is_empty() {
                return Err(HardwareError::invalid_config("device name is empty"));
            }
            if !names.insert(name.as_str()) {
                return Err(HardwareError::invalid_config(format!(
                    "duplicate device name '{name}'"
                )));
            }
        }

        check_unique_ids(
            DeviceKind::Rangefinder,
            self.rangefinders.iter().map(|r| r.can_id),
        )?;
        check_unique_ids(
            DeviceKind::Regulator,
            self.regulators.iter().map(|r| r.can_id),
        )
    }
}

fn check_unique_ids(kind: DeviceKind, ids: impl Iterator<Item = u8>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(HardwareError::invalid_config(format!(
                "CAN id {id} is used by more than one {kind}"
            )));
        }
    }
    Ok(())
}

/// Latest telemetry of one rangefinder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangefinderSnapshot {
    pub name: String,
    pub measurement: Option<Measurement>,
}

/// Latest telemetry of one regulator, every channel in device order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegulatorSnapshot {
    pub name: String,
    pub channels: Vec<(ChannelId, ChannelReading)>,
}

/// Telemetry of every managed device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusSnapshot {
    pub rangefinders: Vec<RangefinderSnapshot>,
    pub regulators: Vec<RegulatorSnapshot>,
}

/// Counts of managed devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    pub rangefinders: usize,
    pub regulators: usize,

    /// Devices backed by a native handle.
    pub hardware: usize,

    pub mocks: usize,
}

/// Owns every device on the bus.
#[derive(Debug)]
pub struct DeviceManager {
    rangefinders: Vec<(String, AnyRangingDevice)>,
    regulators: Vec<(String, AnyRegulatorDevice)>,
    config: BusConfig,
}

impl DeviceManager {
    /// Build and configure every device in `config`.
    ///
    /// Hardware devices use `backend` when given and the process-wide native
    /// driver otherwise. Regulators apply the adjustable voltage before
    /// enabling channels, because applying a voltage disables the rail.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InvalidConfig` if the configuration does not
    /// validate, `HardwareError::Bootstrap` if the native driver cannot be
    /// loaded, and `HardwareError::Config` if a configuration write still
    /// fails after `config_retries` attempts. Devices built before the
    /// failure are released.
    pub fn build(config: BusConfig, backend: Option<&DriverBackend>) -> Result<Self> {
        config.validate()?;
        let retries = RetryPolicy {
            attempts: config.config_retries,
            delay: Duration::from_millis(config.config_retry_delay_ms),
        };

        let mut rangefinders = Vec::with_capacity(config.rangefinders.len());
        for rf in &config.rangefinders {
            let mut device = if config.simulation {
                AnyRangingDevice::Mock(MockRangefinder::new())
            } else {
                AnyRangingDevice::Hardware(match backend {
                    Some(backend) => LaserRangefinder::with_backend(backend, rf.can_id),
                    None => LaserRangefinder::try_new(rf.can_id)?,
                })
            };

            if let Some(mode) = rf.ranging_mode {
                write_with_retries(&rf.name, "ranging mode", retries, || {
                    device.set_ranging_mode(mode)
                })?;
            }
            if let Some(roi) = rf.roi {
                write_with_retries(&rf.name, "region of interest", retries, || {
                    device.set_region_of_interest(roi)
                })?;
            }
            if let Some(budget) = rf.timing_budget {
                write_with_retries(&rf.name, "timing budget", retries, || {
                    device.set_timing_budget(budget)
                })?;
            }
            rangefinders.push((rf.name.clone(), device));
        }

        let mut regulators = Vec::with_capacity(config.regulators.len());
        for reg in &config.regulators {
            let mut device = if config.simulation {
                AnyRegulatorDevice::Mock(MockRegulator::new())
            } else {
                AnyRegulatorDevice::Hardware(match backend {
                    Some(backend) => VoltageRegulator::with_backend(backend, reg.can_id),
                    None => VoltageRegulator::try_new(reg.can_id)?,
                })
            };

            if let Some(volts) = reg.adjustable_voltage {
                write_with_retries(&reg.name, "adjustable voltage", retries, || {
                    device.set_channel_voltage(ChannelId::Adjustable, volts)
                })?;
            }
            for &channel in &reg.enabled_channels {
                write_with_retries(&reg.name, "channel enable", retries, || {
                    device.set_channel_enabled(channel, true)
                })?;
            }
            regulators.push((reg.name.clone(), device));
        }

        info!(
            rangefinders = rangefinders.len(),
            regulators = regulators.len(),
            simulation = config.simulation,
            "Devices built"
        );

        Ok(Self {
            rangefinders,
            regulators,
            config,
        })
    }

    /// The configuration the devices were built from.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn rangefinder(&self, name: &str) -> Option<&AnyRangingDevice> {
        self.rangefinders
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn rangefinder_mut(&mut self, name: &str) -> Option<&mut AnyRangingDevice> {
        self.rangefinders
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn regulator(&self, name: &str) -> Option<&AnyRegulatorDevice> {
        self.regulators
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn regulator_mut(&mut self, name: &str) -> Option<&mut AnyRegulatorDevice> {
        self.regulators
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    /// Device counts by family and kind.
    pub fn stats(&self) -> ManagerStats {
        let mocks = self.rangefinders.iter().filter(|(_, d)| d.is_mock()).count()
            + self.regulators.iter().filter(|(_, d)| d.is_mock()).count();
        let total = self.rangefinders.len() + self.regulators.len();

        ManagerStats {
            rangefinders: self.rangefinders.len(),
            regulators: self.regulators.len(),
            hardware: total - mocks,
            mocks,
        }
    }

    /// Read the latest telemetry of every device.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Query` for the first regulator query that
    /// fails.
    pub fn snapshot(&self) -> Result<BusSnapshot> {
        let rangefinders = self
            .rangefinders
            .iter()
            .map(|(name, device)| RangefinderSnapshot {
                name: name.clone(),
                measurement: device.get_measurement(),
            })
            .collect();

        let regulators = self
            .regulators
            .iter()
            .map(|(name, device)| {
                let channels = ChannelId::ALL
                    .into_iter()
                    .map(|ch| device.channel_reading(ch).map(|reading| (ch, reading)))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| HardwareError::query(name.clone(), e))?;
                Ok(RegulatorSnapshot {
                    name: name.clone(),
                    channels,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BusSnapshot {
            rangefinders,
            regulators,
        })
    }

    /// Close every device, releasing all native handles.
    pub fn shutdown(self) {
        let count = self.rangefinders.len() + self.regulators.len();
        for (_, device) in self.rangefinders {
            device.close();
        }
        for (_, device) in self.regulators {
            device.close();
        }
        info!(devices = count, "Devices closed");
    }
}

/// How often and how far apart a configuration write is attempted.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

/// Run a configuration write, resending it on failure.
///
/// `ParamOutOfBounds` is final: the device rejected the value itself and a
/// resend would be rejected again.
fn write_with_retries<F>(device: &str, setting: &str, policy: RetryPolicy, mut write: F) -> Result<()>
where
    F: FnMut() -> std::result::Result<(), ConfigError>,
{
    let mut attempt = 1;
    loop {
        match write() {
            Ok(()) => return Ok(()),
            Err(e) if attempt < policy.attempts && e.kind() != ErrorCode::ParamOutOfBounds => {
                warn!(device, setting, attempt, error = %e, "Configuration write failed, resending");
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(e) => return Err(HardwareError::config(device, e)),
        }
    }
}
