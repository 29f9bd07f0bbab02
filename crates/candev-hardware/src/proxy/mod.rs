//! Hardware-backed device proxies.
//!
//! Each proxy owns one [`NativeHandle`](crate::handle::NativeHandle) and
//! translates typed calls into native driver calls through it. The handle is
//! freed by [`close`](rangefinder::LaserRangefinder::close) or, failing that,
//! when the proxy is dropped.

pub mod rangefinder;
pub mod regulator;

pub use rangefinder::LaserRangefinder;
pub use regulator::VoltageRegulator;
