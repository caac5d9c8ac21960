//! Bus backend abstraction.

#[cfg(feature = "mock")]
pub mod mock;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Upper 16 bits of a device UID select its device class.
pub const DEVICE_CLASS_MASK: u32 = 0xFFFF_0000;

/// Returns the device class of a UID.
pub fn device_class(uid: u32) -> u32 {
    uid & DEVICE_CLASS_MASK
}

/// Errors reported by a bus backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("no device at address {0}")]
    UnknownAddress(u8),

    #[error("device at address {address} has no object {index}")]
    UnknownObject { address: u8, index: u16 },

    #[error("object {index} at address {address} is read-only")]
    ReadOnly { address: u8, index: u16 },
}

/// What the bus reports about an attached device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub uid: u32,
    pub address: u8,
    pub class: u32,
    pub name: String,
}

/// A sensor bus backend.
pub trait SensorBus: Send + Sync + fmt::Debug {
    /// UIDs of the devices currently on the bus.
    fn active_devices(&self) -> Vec<u32>;

    fn device_info(&self, uid: u32) -> Option<DeviceInfo>;

    fn read_object(&self, address: u8, index: u16) -> Result<Value, BusError>;

    fn write_object(&self, address: u8, index: u16, value: Value) -> Result<(), BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_class() {
        assert_eq!(device_class(0x0001_00AB), 0x0001_0000);
        assert_eq!(device_class(0x0000_FFFF), 0);
    }
}
