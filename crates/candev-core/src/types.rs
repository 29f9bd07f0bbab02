use crate::{
    Result,
    constants::{CHANNEL_COUNT, NOMINAL_RAIL_VOLTAGE},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Rangefinder
// ============================================================================

/// Measurement status reported by the rangefinder.
///
/// The numeric values are the device's own and are not contiguous: 3, 5 and
/// 6 are not statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusCode {
    /// The measurement is valid.
    ValidMeasurement = 0,

    /// The signal was obtained in a high-noise environment. A longer timing
    /// budget may make the reading more reliable.
    NoiseIssue = 1,

    /// The return is too weak: the target is too far, too small or not
    /// reflective enough.
    WeakSignal = 2,

    /// The target sits on the limits of the sensor's range. Usually only
    /// seen with bright targets.
    OutOfBounds = 4,

    /// A highly reflective target beyond the theoretical range was detected
    /// and the distance wrapped around to a smaller value.
    Wraparound = 7,
}

impl StatusCode {
    /// Decode a device status value.
    ///
    /// # Errors
    /// Returns `Error::InvalidStatusCode` for anything outside `{0, 1, 2, 4, 7}`.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::ValidMeasurement),
            1 => Ok(Self::NoiseIssue),
            2 => Ok(Self::WeakSignal),
            4 => Ok(Self::OutOfBounds),
            7 => Ok(Self::Wraparound),
            other => Err(Error::InvalidStatusCode(other)),
        }
    }

    /// Device status value.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the distance can be trusted.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self == Self::ValidMeasurement
    }

    /// Short description of the status.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::ValidMeasurement => "valid measurement",
            Self::NoiseIssue => "noisy signal",
            Self::WeakSignal => "weak signal",
            Self::OutOfBounds => "target at range limit",
            Self::Wraparound => "distance wrapped around",
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Ranging mode of the rangefinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RangingMode {
    /// Detects targets up to 4 m but is more sensitive to ambient light.
    Long,

    /// Detects targets up to 1.3 m and tolerates ambient light better.
    #[default]
    Short,
}

impl RangingMode {
    /// Device encoding: `true` means long range.
    #[must_use]
    pub const fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }

    /// Decode the device encoding.
    #[must_use]
    pub const fn from_is_long(is_long: bool) -> Self {
        if is_long { Self::Long } else { Self::Short }
    }
}

/// Measurement integration window of the rangefinder.
///
/// Longer budgets give more accurate and repeatable results at a lower rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimingBudget {
    #[default]
    #[serde(rename = "20ms")]
    Ms20,
    #[serde(rename = "33ms")]
    Ms33,
    #[serde(rename = "50ms")]
    Ms50,
    #[serde(rename = "100ms")]
    Ms100,
}

impl TimingBudget {
    /// All budgets, shortest first.
    pub const ALL: [TimingBudget; 4] = [Self::Ms20, Self::Ms33, Self::Ms50, Self::Ms100];

    /// The millisecond value sent to the device.
    #[must_use]
    pub const fn as_millis(self) -> u8 {
        match self {
            Self::Ms20 => 20,
            Self::Ms33 => 33,
            Self::Ms50 => 50,
            Self::Ms100 => 100,
        }
    }

    /// Decode a millisecond value reported by the device.
    ///
    /// # Errors
    /// Returns `Error::InvalidTimingBudget` for anything but 20, 33, 50 or 100.
    pub fn from_millis(ms: u8) -> Result<Self> {
        match ms {
            20 => Ok(Self::Ms20),
            33 => Ok(Self::Ms33),
            50 => Ok(Self::Ms50),
            100 => Ok(Self::Ms100),
            other => Err(Error::InvalidTimingBudget(other)),
        }
    }
}

impl fmt::Display for TimingBudget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ms", self.as_millis())
    }
}

/// Rectangular sub-area of the sensor's field used to bound ranging.
///
/// Validity is decided by the device; the host forwards all four fields as a
/// single unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub x: u8,
    pub y: u8,
    pub w: u8,
    pub h: u8,
}

impl RegionOfInterest {
    pub const fn new(x: u8, y: u8, w: u8, h: u8) -> Self {
        Self { x, y, w, h }
    }
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::new(0, 0, 16, 16)
    }
}

impl fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}@({},{})", self.w, self.h, self.x, self.y)
    }
}

/// One reading from the rangefinder, with the configuration it was taken with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub status: StatusCode,

    /// Distance to the target, in millimetres.
    pub distance_mm: u16,

    /// Approximate ambient light level.
    pub ambient: u16,

    /// Whether the reading was taken in long ranging mode.
    pub is_long: bool,

    /// Timing budget the reading was taken with, in milliseconds.
    pub budget_ms: u8,

    /// Region of interest the reading was taken with.
    pub roi: RegionOfInterest,
}

impl Measurement {
    /// Ranging mode the reading was taken with.
    #[must_use]
    pub fn ranging_mode(&self) -> RangingMode {
        RangingMode::from_is_long(self.is_long)
    }

    /// Distance in millimetres, only when the status says it can be trusted.
    #[must_use]
    pub fn valid_distance_mm(&self) -> Option<u16> {
        self.status.is_valid().then_some(self.distance_mm)
    }
}

// ============================================================================
// Regulator
// ============================================================================

/// One of the regulator's five power rails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelId {
    Usb1 = 0,
    Usb2 = 1,
    FiveVA = 2,
    FiveVB = 3,
    /// The only rail whose voltage can be set.
    Adjustable = 4,
}

impl ChannelId {
    /// All channels in device order.
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        Self::Usb1,
        Self::Usb2,
        Self::FiveVA,
        Self::FiveVB,
        Self::Adjustable,
    ];

    /// Device channel index.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Decode a device channel index.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannel` for indices of 5 and above.
    pub fn from_index(index: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(index))
            .copied()
            .ok_or(Error::InvalidChannel(index))
    }

    /// Whether this rail accepts a voltage setpoint.
    #[must_use]
    pub const fn is_adjustable(self) -> bool {
        matches!(self, Self::Adjustable)
    }

    /// Setpoint a rail reports before the device has said otherwise.
    ///
    /// Fixed rails sit at the nominal voltage; the adjustable rail has none.
    #[must_use]
    pub fn default_setpoint(self) -> Option<f64> {
        (!self.is_adjustable()).then_some(NOMINAL_RAIL_VOLTAGE)
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self> {
        Self::from_index(index)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Usb1 => "USB1",
            Self::Usb2 => "USB2",
            Self::FiveVA => "5VA",
            Self::FiveVB => "5VB",
            Self::Adjustable => "ADJ",
        };
        write!(f, "{name}")
    }
}

/// Reported enable state of a channel.
///
/// Wrapped in `Option` wherever the device may not have reported yet, which
/// gives the unknown/disabled/enabled tri-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnabledState {
    Disabled,
    Enabled,
}

impl EnabledState {
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Device encoding: 0 disabled, 1 enabled.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }
}

impl From<bool> for EnabledState {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

/// Snapshot of everything known about one channel.
///
/// `None` means the device has not reported the value yet, which is distinct
/// from a reading of zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelReading {
    /// Current draw, in amperes.
    pub current: Option<f64>,

    /// Output voltage, in volts.
    pub voltage: Option<f64>,

    /// Voltage setpoint, in volts.
    pub voltage_setpoint: Option<f64>,

    pub enabled: Option<EnabledState>,
}

impl ChannelReading {
    /// Initial state of a channel before any report, as seen by the host.
    #[must_use]
    pub fn initial(channel: ChannelId) -> Self {
        Self {
            voltage_setpoint: channel.default_setpoint(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, StatusCode::ValidMeasurement)]
    #[case(1, StatusCode::NoiseIssue)]
    #[case(2, StatusCode::WeakSignal)]
    #[case(4, StatusCode::OutOfBounds)]
    #[case(7, StatusCode::Wraparound)]
    fn test_status_code_valid(#[case] code: u8, #[case] expected: StatusCode) {
        let status = StatusCode::from_code(code).unwrap();
        assert_eq!(status, expected);
        assert_eq!(status.code(), code);
    }

    #[rstest]
    #[case(3)]
    #[case(5)]
    #[case(6)]
    #[case(8)]
    #[case(255)]
    fn test_status_code_invalid(#[case] code: u8) {
        assert_eq!(
            StatusCode::try_from(code),
            Err(Error::InvalidStatusCode(code))
        );
    }

    #[test]
    fn test_only_valid_measurement_is_valid() {
        assert!(StatusCode::ValidMeasurement.is_valid());
        assert!(!StatusCode::NoiseIssue.is_valid());
        assert!(!StatusCode::Wraparound.is_valid());
    }

    #[rstest]
    #[case(TimingBudget::Ms20, 20)]
    #[case(TimingBudget::Ms33, 33)]
    #[case(TimingBudget::Ms50, 50)]
    #[case(TimingBudget::Ms100, 100)]
    fn test_timing_budget_millis(#[case] budget: TimingBudget, #[case] ms: u8) {
        assert_eq!(budget.as_millis(), ms);
        assert_eq!(TimingBudget::from_millis(ms).unwrap(), budget);
    }

    #[test]
    fn test_timing_budget_rejects_other_values() {
        assert!(TimingBudget::from_millis(0).is_err());
        assert!(TimingBudget::from_millis(25).is_err());
        assert!(TimingBudget::from_millis(200).is_err());
    }

    #[test]
    fn test_ranging_mode_encoding() {
        assert!(RangingMode::Long.is_long());
        assert!(!RangingMode::Short.is_long());
        assert_eq!(RangingMode::from_is_long(true), RangingMode::Long);
        assert_eq!(RangingMode::from_is_long(false), RangingMode::Short);
    }

    #[rstest]
    #[case(0, ChannelId::Usb1)]
    #[case(1, ChannelId::Usb2)]
    #[case(2, ChannelId::FiveVA)]
    #[case(3, ChannelId::FiveVB)]
    #[case(4, ChannelId::Adjustable)]
    fn test_channel_index(#[case] index: u8, #[case] channel: ChannelId) {
        assert_eq!(ChannelId::from_index(index).unwrap(), channel);
        assert_eq!(channel.index(), index);
    }

    #[test]
    fn test_channel_out_of_range() {
        assert_eq!(ChannelId::try_from(5), Err(Error::InvalidChannel(5)));
    }

    #[test]
    fn test_only_adjustable_is_adjustable() {
        let adjustable: Vec<_> = ChannelId::ALL
            .into_iter()
            .filter(|c| c.is_adjustable())
            .collect();
        assert_eq!(adjustable, vec![ChannelId::Adjustable]);
    }

    #[test]
    fn test_initial_channel_reading() {
        let fixed = ChannelReading::initial(ChannelId::FiveVA);
        assert_eq!(fixed.voltage_setpoint, Some(NOMINAL_RAIL_VOLTAGE));
        assert_eq!(fixed.current, None);
        assert_eq!(fixed.enabled, None);

        let adj = ChannelReading::initial(ChannelId::Adjustable);
        assert_eq!(adj.voltage_setpoint, None);
    }

    #[test]
    fn test_measurement_valid_distance() {
        let mut m = Measurement {
            status: StatusCode::ValidMeasurement,
            distance_mm: 1200,
            ambient: 30,
            is_long: true,
            budget_ms: 100,
            roi: RegionOfInterest::default(),
        };
        assert_eq!(m.valid_distance_mm(), Some(1200));
        assert_eq!(m.ranging_mode(), RangingMode::Long);

        m.status = StatusCode::WeakSignal;
        assert_eq!(m.valid_distance_mm(), None);
    }

    #[test]
    fn test_timing_budget_serialization() {
        let json = serde_json::to_string(&TimingBudget::Ms33).unwrap();
        assert_eq!(json, "\"33ms\"");
        let parsed: TimingBudget = serde_json::from_str("\"100ms\"").unwrap();
        assert_eq!(parsed, TimingBudget::Ms100);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChannelId::Adjustable.to_string(), "ADJ");
        assert_eq!(TimingBudget::Ms50.to_string(), "50ms");
        assert_eq!(RegionOfInterest::new(8, 8, 16, 16).to_string(), "16x16@(8,8)");
        assert_eq!(StatusCode::Wraparound.to_string(), "distance wrapped around (7)");
    }
}
