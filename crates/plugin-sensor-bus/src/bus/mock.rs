//! In-memory bus for development and testing.
//!
//! Devices are attached and detached by hand; addresses are assigned in
//! attach order starting at 1.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;

use super::{BusError, DeviceInfo, SensorBus, device_class};

#[derive(Debug, Clone)]
struct MockObject {
    value: Value,
    writable: bool,
}

#[derive(Debug, Clone)]
struct MockDevice {
    info: DeviceInfo,
    objects: BTreeMap<u16, MockObject>,
}

/// Mock bus that keeps its devices in memory.
#[derive(Debug, Default)]
pub struct MockBus {
    /// Attached devices: uid -> device
    devices: Mutex<BTreeMap<u32, MockDevice>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a device and returns its bus address.
    pub fn attach(&self, uid: u32, name: &str) -> u8 {
        let mut devices = self.devices.lock();
        if let Some(existing) = devices.get(&uid) {
            return existing.info.address;
        }
        let address = devices
            .values()
            .map(|d| d.info.address)
            .max()
            .map_or(1, |max| max.saturating_add(1));
        devices.insert(
            uid,
            MockDevice {
                info: DeviceInfo {
                    uid,
                    address,
                    class: device_class(uid),
                    name: name.to_string(),
                },
                objects: BTreeMap::new(),
            },
        );
        tracing::debug!(uid = %format!("{uid:#010x}"), address, "[MockBus] Device attached");
        address
    }

    /// Removes a device. Returns whether it was attached.
    pub fn detach(&self, uid: u32) -> bool {
        let removed = self.devices.lock().remove(&uid).is_some();
        if removed {
            tracing::debug!(uid = %format!("{uid:#010x}"), "[MockBus] Device detached");
        }
        removed
    }

    /// Sets an object on an attached device. Returns whether the device
    /// exists.
    pub fn set_object(&self, uid: u32, index: u16, value: Value, writable: bool) -> bool {
        match self.devices.lock().get_mut(&uid) {
            Some(device) => {
                device.objects.insert(index, MockObject { value, writable });
                true
            }
            None => false,
        }
    }

    fn with_object<T>(
        &self,
        address: u8,
        index: u16,
        f: impl FnOnce(&mut MockObject) -> Result<T, BusError>,
    ) -> Result<T, BusError> {
        let mut devices = self.devices.lock();
        let device = devices
            .values_mut()
            .find(|d| d.info.address == address)
            .ok_or(BusError::UnknownAddress(address))?;
        let object = device
            .objects
            .get_mut(&index)
            .ok_or(BusError::UnknownObject { address, index })?;
        f(object)
    }
}

impl SensorBus for MockBus {
    fn active_devices(&self) -> Vec<u32> {
        self.devices.lock().keys().copied().collect()
    }

    fn device_info(&self, uid: u32) -> Option<DeviceInfo> {
        self.devices.lock().get(&uid).map(|d| d.info.clone())
    }

    fn read_object(&self, address: u8, index: u16) -> Result<Value, BusError> {
        self.with_object(address, index, |object| Ok(object.value.clone()))
    }

    fn write_object(&self, address: u8, index: u16, value: Value) -> Result<(), BusError> {
        self.with_object(address, index, |object| {
            if !object.writable {
                return Err(BusError::ReadOnly { address, index });
            }
            object.value = value;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_addresses_follow_attach_order() {
        let bus = MockBus::new();
        assert_eq!(bus.attach(0x0001_0001, "first"), 1);
        assert_eq!(bus.attach(0x0002_0001, "second"), 2);
        assert_eq!(bus.attach(0x0001_0001, "first again"), 1);

        assert!(bus.detach(0x0001_0001));
        assert!(!bus.detach(0x0001_0001));
        assert_eq!(bus.attach(0x0003_0001, "third"), 3);
        assert_eq!(bus.active_devices(), vec![0x0002_0001, 0x0003_0001]);
    }

    #[test]
    fn test_device_info() {
        let bus = MockBus::new();
        bus.attach(0x0001_00AB, "probe");
        let info = bus.device_info(0x0001_00AB).expect("attached");
        assert_eq!(info.class, 0x0001_0000);
        assert_eq!(info.name, "probe");
        assert!(bus.device_info(0x0001_00AC).is_none());
    }

    #[test]
    fn test_read_write_objects() {
        let bus = MockBus::new();
        let address = bus.attach(0x0001_0001, "probe");
        bus.set_object(0x0001_0001, 1, json!(21.5), false);
        bus.set_object(0x0001_0001, 2, json!("idle"), true);

        assert_eq!(bus.read_object(address, 1), Ok(json!(21.5)));
        assert_eq!(
            bus.write_object(address, 1, json!(0)),
            Err(BusError::ReadOnly { address, index: 1 })
        );
        bus.write_object(address, 2, json!("busy")).expect("writable");
        assert_eq!(bus.read_object(address, 2), Ok(json!("busy")));

        assert_eq!(bus.read_object(address, 9), Err(BusError::UnknownObject { address, index: 9 }));
        assert_eq!(bus.read_object(77, 1), Err(BusError::UnknownAddress(77)));
    }
}
