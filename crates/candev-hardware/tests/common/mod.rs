//! Common test utilities for integration tests.
//!
//! Builds each device family in both variants over a shared simulated bus,
//! so substitution tests can run the same scenario against hardware-backed
//! and mock devices and compare the outcome.

#![allow(dead_code)]

use candev_core::{Measurement, RegionOfInterest, StatusCode};
use candev_hardware::devices::{AnyRangingDevice, AnyRegulatorDevice};
use candev_hardware::mock::{MockRangefinder, MockRegulator};
use candev_hardware::proxy::{LaserRangefinder, VoltageRegulator};
use candev_hardware::sim::SimDriver;
use std::sync::Arc;

/// CAN id used for devices unless a test needs several.
pub const TEST_CAN_ID: u8 = 3;

/// A simulated bus shared by every device a test builds.
pub fn sim_bus() -> Arc<SimDriver> {
    Arc::new(SimDriver::new())
}

/// A hardware-backed rangefinder on `sim`.
pub fn hardware_rangefinder(sim: &Arc<SimDriver>, can_id: u8) -> AnyRangingDevice {
    AnyRangingDevice::Hardware(LaserRangefinder::with_backend(&sim.backend(), can_id))
}

/// A hardware-backed regulator on `sim`, already reporting status.
pub fn online_regulator(sim: &Arc<SimDriver>, can_id: u8) -> AnyRegulatorDevice {
    let device = VoltageRegulator::with_backend(&sim.backend(), can_id);
    sim.publish_regulator_status(can_id);
    AnyRegulatorDevice::Hardware(device)
}

/// Both regulator variants: hardware-backed first, then mock.
pub fn both_regulators(sim: &Arc<SimDriver>) -> [AnyRegulatorDevice; 2] {
    [
        online_regulator(sim, TEST_CAN_ID),
        AnyRegulatorDevice::Mock(MockRegulator::new()),
    ]
}

/// Both rangefinder variants: hardware-backed first, then mock.
pub fn both_rangefinders(sim: &Arc<SimDriver>) -> [AnyRangingDevice; 2] {
    [
        hardware_rangefinder(sim, TEST_CAN_ID),
        AnyRangingDevice::Mock(MockRangefinder::new()),
    ]
}

/// A valid reading with every field set.
pub fn sample_measurement(distance_mm: u16) -> Measurement {
    Measurement {
        status: StatusCode::ValidMeasurement,
        distance_mm,
        ambient: 20,
        is_long: false,
        budget_ms: 33,
        roi: RegionOfInterest::new(8, 8, 16, 16),
    }
}
