//! Host-side device layer for CAN-bus peripherals.
//!
//! Two device families are supported: a laser rangefinder and a five-channel
//! voltage regulator. Each family is described by a capability trait and has
//! exactly two implementations, so application code can swap real hardware
//! for an in-memory mock without changing behavior.
//!
//! # Device Traits
//!
//! ## Rangefinders
//!
//! ```
//! use candev_hardware::traits::RangingDevice;
//! use candev_core::StatusCode;
//!
//! fn obstacle_within<R: RangingDevice>(sensor: &R, limit_mm: u16) -> bool {
//!     sensor
//!         .get_measurement()
//!         .is_some_and(|m| m.status == StatusCode::ValidMeasurement && m.distance_mm < limit_mm)
//! }
//! ```
//!
//! ## Regulators
//!
//! ```
//! use candev_hardware::traits::RegulatorDevice;
//! use candev_core::{ChannelId, QueryError};
//!
//! fn total_current<R: RegulatorDevice>(pdh: &R) -> Result<f64, QueryError> {
//!     let mut total = 0.0;
//!     for channel in ChannelId::ALL {
//!         total += pdh.get_channel_current(channel)?.unwrap_or(0.0);
//!     }
//!     Ok(total)
//! }
//! ```
//!
//! # Native Driver
//!
//! Hardware-backed proxies talk to the native CAN driver through the traits
//! in [`driver`]. The driver is loaded once per process by [`bootstrap`];
//! each proxy owns a [`NativeHandle`](handle::NativeHandle) that is freed
//! exactly once, on `close` or on drop. With the `sim` feature (on by
//! default) an in-process [`SimDriver`](sim::SimDriver) stands in for the
//! native driver.
//!
//! # Error Handling
//!
//! Device operations return `ConfigError` or `QueryError` from `candev-core`,
//! carrying the driver's error kind unchanged. Everything around the devices
//! (loading the driver, reading configuration) uses [`HardwareError`].

pub mod bootstrap;
pub mod devices;
pub mod driver;
pub mod error;
pub mod handle;
pub mod manager;
pub mod mock;
pub mod proxy;
#[cfg(feature = "sim")]
pub mod sim;
pub mod traits;

// Re-export commonly used types for convenience
pub use error::{BootstrapError, HardwareError, Result};
pub use traits::{RangingDevice, RegulatorDevice};

pub use devices::{AnyRangingDevice, AnyRegulatorDevice};
pub use manager::{BusConfig, BusSnapshot, DeviceKind, DeviceManager, ManagerStats};
