//! The `sensornode` component: driver for one device on the bus.
//!
//! Its descriptor is the structure document in `structures/sensornode.json`.
//! Every bus access goes through the `sensorbus.*` custom methods, so the
//! type is only discovered after the bus master.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use modhost_core::types::KwargsExt;
use modhost_plugin::component::factory;
use modhost_plugin::descriptor::ModuleStructure;
use modhost_plugin::{
    CallbackError, CapabilityTable, Component, ComponentContext, ComponentDescriptor, ComponentFactory, EngineError,
    Mediator,
};
use modhost_plugin_sdk::exports::ComponentExport;

use crate::bus::DeviceInfo;
use crate::master;

pub const COMPONENT_TYPE: &str = "sensornode";

/// Device class handled by this driver.
pub const DEVICE_CLASS: u32 = 0x0001_0000;

/// Object holding the current temperature.
pub const TEMPERATURE_OBJECT: u16 = 1;
/// Object holding the temperature setpoint.
pub const SETPOINT_OBJECT: u16 = 2;

const STRUCTURE: &str = include_str!("../structures/sensornode.json");

/// Export of the node driver, described by the embedded structure
/// document. Requires `sensorbus` to be discovered first.
pub fn export() -> Result<ComponentExport, EngineError> {
    ComponentExport::from_structure_json(STRUCTURE, node_factory()).map(finish_export)
}

/// Like [`export`], with the structure document read from `path`.
pub fn export_from_file(path: &Path) -> Result<ComponentExport, EngineError> {
    let structure = ModuleStructure::from_file(path)?;
    Ok(finish_export(ComponentExport::new(
        ComponentDescriptor::from_structure(&structure),
        node_factory(),
    )))
}

fn node_factory() -> ComponentFactory {
    factory(|ctx| Ok(Arc::new(SensorNode::build(ctx)?) as Arc<dyn Component>))
}

fn finish_export(export: ComponentExport) -> ComponentExport {
    export
        .map_descriptor(|d| d.multi_instance().with_required_arg("uid", "UID of the device to drive"))
        .requires(master::COMPONENT_TYPE)
}

struct NodeState {
    mediator: Mediator,
    info: DeviceInfo,
    label: Mutex<String>,
}

impl NodeState {
    fn read(&self, index: u16) -> Result<Value, CallbackError> {
        self.mediator
            .call_custom_method(
                master::METHOD_READ_OBJECT,
                vec![json!(self.info.address), json!(index)],
            )
            .ok_or_else(|| CallbackError::new(format!("reading object {index} failed")))
    }

    fn write(&self, index: u16, value: Value) -> Result<(), CallbackError> {
        self.mediator
            .call_custom_method(
                master::METHOD_WRITE_OBJECT,
                vec![json!(self.info.address), json!(index), value],
            )
            .map(|_| ())
            .ok_or_else(|| CallbackError::new(format!("writing object {index} failed")))
    }
}

/// A loaded node driver.
pub struct SensorNode {
    table: CapabilityTable,
}

impl SensorNode {
    fn build(ctx: ComponentContext) -> Result<Self, CallbackError> {
        let uid = ctx
            .kwargs
            .get_i64("uid")
            .and_then(|uid| u32::try_from(uid).ok())
            .ok_or("uid must be a 32-bit device UID")?;

        let info = ctx
            .mediator
            .call_custom_method(master::METHOD_DEVICE_INFO, vec![json!(uid)])
            .filter(|info| !info.is_null())
            .ok_or_else(|| CallbackError::new(format!("device {uid:#010x} is not on the bus")))?;
        let info: DeviceInfo = serde_json::from_value(info)?;
        ctx.mediator.log_info(format!(
            "driving {} ({uid:#010x}) at address {}",
            info.name, info.address
        ));

        let label = info.name.clone();
        let node = Arc::new(NodeState {
            mediator: ctx.mediator.clone(),
            info,
            label: Mutex::new(label),
        });

        let table = CapabilityTable::new()
            .getter("uid", {
                let node = node.clone();
                move || Ok(json!(node.info.uid))
            })
            .getter("address", {
                let node = node.clone();
                move || Ok(json!(node.info.address))
            })
            .getter("name", {
                let node = node.clone();
                move || Ok(json!(node.info.name))
            })
            .getter("temperature", {
                let node = node.clone();
                move || node.read(TEMPERATURE_OBJECT)
            })
            .getter("setpoint", {
                let node = node.clone();
                move || node.read(SETPOINT_OBJECT)
            })
            .setter("setpoint", {
                let node = node.clone();
                move |value| {
                    if !value.is_number() {
                        return Err("setpoint must be a number".into());
                    }
                    node.write(SETPOINT_OBJECT, value)
                }
            })
            .getter("label", {
                let node = node.clone();
                move || Ok(json!(*node.label.lock()))
            })
            .setter("label", {
                let node = node.clone();
                move |value| {
                    let label = value.as_str().ok_or("label must be a string")?;
                    *node.label.lock() = label.to_string();
                    Ok(())
                }
            })
            .method("read_object", move |kwargs| {
                let index = kwargs
                    .get_i64("index")
                    .and_then(|index| u16::try_from(index).ok())
                    .ok_or("index must be a 16-bit object index")?;
                Ok(json!({ "index": index, "value": node.read(index)? }))
            });

        Ok(Self { table })
    }
}

impl Component for SensorNode {
    fn capabilities(&self) -> &CapabilityTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_plugin::descriptor::{DataType, Permission};

    #[test]
    fn test_structure_document_parses() {
        let export = export().expect("embedded structure is valid");
        let descriptor = export.descriptor();

        assert_eq!(export.component_type(), COMPONENT_TYPE);
        assert!(descriptor.allows_multiple_instances());
        assert_eq!(descriptor.required_args[0].name, "uid");
        assert_eq!(descriptor.properties["temperature"].permission, Permission::Read);
        assert_eq!(descriptor.properties["setpoint"].data_type, DataType::Float);
        assert!(descriptor.methods["read_object"].args["index"].required);
        assert_eq!(export.requirements(), [master::COMPONENT_TYPE.to_string()]);
    }
}
