//! Device-level constants shared by every implementation.
//!
//! These values mirror what the device firmware and native driver expect.
//! Changing them breaks compatibility with real hardware.

use std::time::Duration;

// ============================================================================
// Regulator
// ============================================================================

/// Number of addressable power rails on the regulator.
pub const CHANNEL_COUNT: usize = 5;

/// Fixed output voltage of every rail except the adjustable one, in volts.
///
/// Also the default voltage setpoint reported for those rails before the
/// device says otherwise.
pub const NOMINAL_RAIL_VOLTAGE: f64 = 5.0;

/// Highest voltage the adjustable rail can be commanded to, in volts.
///
/// The device carries setpoints as unsigned 16-bit millivolts.
pub const MAX_ADJUSTABLE_VOLTAGE: f64 = u16::MAX as f64 / 1000.0;

// ============================================================================
// Rangefinder
// ============================================================================

/// Smallest ROI width or height accepted by the sensor.
pub const MIN_ROI_SIZE: u8 = 4;

/// Largest ROI width or height accepted by the sensor (full field).
pub const MAX_ROI_SIZE: u8 = 16;

/// Largest ROI origin coordinate accepted by the sensor.
pub const MAX_ROI_COORDINATE: u8 = 15;

// ============================================================================
// Native driver timing
// ============================================================================

/// Age after which a cached status or measurement frame is treated as absent.
pub const FRAME_STALE_AFTER: Duration = Duration::from_millis(500);

/// Number of times a configuration write is resent before giving up.
pub const DEFAULT_CONFIG_RETRIES: u32 = 3;

/// Pause between resends of a failed configuration write, in milliseconds.
///
/// Long enough for the device to publish a fresh status frame between
/// attempts.
pub const DEFAULT_CONFIG_RETRY_DELAY_MS: u64 = 20;
