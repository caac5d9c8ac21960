//! Sensor bus components for modhost.
//!
//! Two component types:
//!
//! - `sensorbus`: the bus master. Polls the bus on `manager.tick`, loads a
//!   class driver for each device that appears and unloads it when the
//!   device goes away. Publishes `sensorbus.*` custom methods, hooks and an
//!   interrupt for other components.
//! - `sensornode`: a per-device driver, described by a structure document
//!   and discovered only after the bus master.
//!
//! The bus backend is abstracted by [`bus::SensorBus`]. With the `mock`
//! feature (default) an in-memory [`bus::mock::MockBus`] is available.

pub mod bus;
pub mod master;
pub mod node;
pub mod plugin;

pub use bus::{BusError, DeviceInfo, SensorBus};
pub use plugin::SensorBusPlugin;
