//! Mock device implementations for testing and simulation.
//!
//! Mocks satisfy the same capability traits as the hardware-backed proxies
//! and hold all state in memory. Their `set_*` injectors are inherent
//! methods, so they are only reachable through the concrete mock type.

pub mod rangefinder;
pub mod regulator;

pub use rangefinder::MockRangefinder;
pub use regulator::MockRegulator;
