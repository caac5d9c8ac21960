//! The `sensorbus` component: bus master and driver loader.
//!
//! On construction and then every `poll_every` ticks the master compares
//! the bus against the devices it already knows. For each new device it
//! fires `sensorbus.device_found` and, if a class driver is registered for
//! the device class, loads that driver with `{uid, instance_suffix}`. The
//! driver is owned by the master and unloaded when the device disappears or
//! the master itself unloads.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, warn};

use modhost_core::events::SystemHook;
use modhost_core::types::Kwargs;
use modhost_plugin::component::factory;
use modhost_plugin::descriptor::{DataType, MethodDescriptor, Permission, PropertyDescriptor};
use modhost_plugin::hooks::definitions::hook_callback;
use modhost_plugin::mediator::ManagerNotice;
use modhost_plugin::registries::interrupts::interrupt_callback;
use modhost_plugin::registries::methods::method_callback;
use modhost_plugin::{
    CallbackError, CapabilityTable, Component, ComponentContext, ComponentDescriptor, HookAction, HookArgument,
    Mediator, kwargs,
};
use modhost_plugin_sdk::exports::ComponentExport;

use crate::bus::{SensorBus, device_class};

pub const COMPONENT_TYPE: &str = "sensorbus";

pub const DEVICE_FOUND_HOOK: &str = "sensorbus.device_found";
pub const DEVICE_LOST_HOOK: &str = "sensorbus.device_lost";
/// Interrupt that triggers an immediate poll.
pub const SCAN_INTERRUPT: &str = "sensorbus.irq";

pub const METHOD_DEVICE_INFO: &str = "sensorbus.device_info";
pub const METHOD_READ_OBJECT: &str = "sensorbus.read_object";
pub const METHOD_WRITE_OBJECT: &str = "sensorbus.write_object";
pub const METHOD_REGISTER_CLASS_DRIVER: &str = "sensorbus.register_class_driver";

const DEFAULT_POLL_EVERY: u64 = 60;

/// Descriptor of the bus master.
pub fn descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new(COMPONENT_TYPE, "Sensor bus master")
        .with_optional_arg("poll_every", "Ticks between bus polls")
        .with_property(
            "device_count",
            PropertyDescriptor::new("Number of devices on the bus", Permission::Read, DataType::Int),
        )
        .with_property(
            "poll_every",
            PropertyDescriptor::new("Ticks between bus polls", Permission::ReadWrite, DataType::Int),
        )
        .with_property(
            "drivers",
            PropertyDescriptor::new("Loaded driver instance per device UID", Permission::Read, DataType::Dict),
        )
        .with_method("scan", MethodDescriptor::new("Poll the bus now", DataType::Int))
}

/// Export of the bus master over `bus`, with the initial class drivers.
pub fn export(bus: Arc<dyn SensorBus>, class_drivers: Vec<(u32, String)>) -> ComponentExport {
    ComponentExport::new(
        descriptor(),
        factory(move |ctx| {
            let master = SensorBusMaster::build(ctx, bus.clone(), &class_drivers)?;
            Ok(Arc::new(master) as Arc<dyn Component>)
        }),
    )
}

struct MasterState {
    bus: Arc<dyn SensorBus>,
    mediator: Mediator,
    /// device class -> driver component type
    class_drivers: Mutex<HashMap<u32, String>>,
    known: Mutex<BTreeSet<u32>>,
    /// device uid -> driver instance
    drivers: Mutex<BTreeMap<u32, String>>,
    poll_every: AtomicU64,
    ticks_since_poll: AtomicU64,
}

impl MasterState {
    /// Diffs the bus against the known devices. Returns the device count.
    fn poll(&self) -> usize {
        let active: BTreeSet<u32> = self.bus.active_devices().into_iter().collect();
        let (added, removed) = {
            let mut known = self.known.lock();
            let added: Vec<u32> = active.difference(&known).copied().collect();
            let removed: Vec<u32> = known.difference(&active).copied().collect();
            *known = active.clone();
            (added, removed)
        };

        for uid in removed {
            self.device_lost(uid);
        }
        for uid in added {
            self.device_found(uid);
        }
        active.len()
    }

    fn device_found(&self, uid: u32) {
        let Some(info) = self.bus.device_info(uid) else {
            self.mediator
                .log_warning(format!("device {uid:#010x} vanished before it could be inspected"));
            return;
        };

        if let Err(e) = self.mediator.fire_custom_hook(
            DEVICE_FOUND_HOOK,
            kwargs! { "uid" => uid, "address" => (info.address), "class" => (info.class) },
        ) {
            warn!(uid = %format!("{uid:#010x}"), error = %e, "Failed to fire device_found");
        }

        let class = device_class(uid);
        let driver = self.class_drivers.lock().get(&class).cloned();
        let Some(component_type) = driver else {
            self.mediator
                .log_info(format!("no driver for device class {:#06x}", class >> 16));
            return;
        };

        self.mediator.log_info(format!(
            "driver for device class {:#06x} is {component_type}, loading",
            class >> 16
        ));
        let kwargs = kwargs! { "uid" => uid, "instance_suffix" => (format!("{uid:08x}")) };
        match self.mediator.load_module(&component_type, kwargs) {
            Some(instance) => {
                self.drivers.lock().insert(uid, instance);
            }
            None => self
                .mediator
                .log_error(format!("could not load {component_type} for device {uid:#010x}")),
        }
    }

    fn device_lost(&self, uid: u32) {
        if let Err(e) = self
            .mediator
            .fire_custom_hook(DEVICE_LOST_HOOK, kwargs! { "uid" => uid })
        {
            warn!(uid = %format!("{uid:#010x}"), error = %e, "Failed to fire device_lost");
        }

        let instance = self.drivers.lock().remove(&uid);
        if let Some(instance) = instance {
            self.mediator.log_info(format!("device {uid:#010x} removed, unloading {instance}"));
            self.mediator.unload_module(&instance);
        }
    }

    fn unload_drivers(&self) {
        let drivers = std::mem::take(&mut *self.drivers.lock());
        for instance in drivers.into_values() {
            self.mediator.unload_module(&instance);
        }
    }

    fn tick(&self) {
        let since = self.ticks_since_poll.fetch_add(1, Ordering::SeqCst) + 1;
        if since >= self.poll_every.load(Ordering::SeqCst) {
            self.ticks_since_poll.store(0, Ordering::SeqCst);
            self.poll();
        }
    }

    fn device_info(&self, uid: u32) -> Value {
        self.bus
            .device_info(uid)
            .and_then(|info| serde_json::to_value(info).ok())
            .unwrap_or(Value::Null)
    }
}

/// Reads an unsigned argument by position, falling back to a keyword.
fn uint_arg(args: &[Value], kwargs: &Kwargs, position: usize, name: &str) -> Result<u64, CallbackError> {
    args.get(position)
        .or_else(|| kwargs.get(name))
        .and_then(Value::as_u64)
        .ok_or_else(|| CallbackError::new(format!("argument '{name}' must be a non-negative integer")))
}

fn address_arg(args: &[Value], kwargs: &Kwargs) -> Result<u8, CallbackError> {
    let address = uint_arg(args, kwargs, 0, "address")?;
    u8::try_from(address).map_err(|_| CallbackError::new(format!("address {address} is out of range")))
}

fn index_arg(args: &[Value], kwargs: &Kwargs) -> Result<u16, CallbackError> {
    let index = uint_arg(args, kwargs, 1, "index")?;
    u16::try_from(index).map_err(|_| CallbackError::new(format!("object index {index} is out of range")))
}

fn uid_arg(args: &[Value], kwargs: &Kwargs, position: usize) -> Result<u32, CallbackError> {
    let uid = uint_arg(args, kwargs, position, "uid")?;
    u32::try_from(uid).map_err(|_| CallbackError::new(format!("uid {uid} is out of range")))
}

/// The bus master instance.
pub struct SensorBusMaster {
    table: CapabilityTable,
    state: Arc<MasterState>,
}

impl SensorBusMaster {
    fn build(
        ctx: ComponentContext,
        bus: Arc<dyn SensorBus>,
        class_drivers: &[(u32, String)],
    ) -> Result<Self, CallbackError> {
        let poll_every = match ctx.arg("poll_every") {
            None => DEFAULT_POLL_EVERY,
            Some(value) => value
                .as_u64()
                .filter(|n| *n > 0)
                .ok_or("poll_every must be a positive integer")?,
        };

        let state = Arc::new(MasterState {
            bus,
            mediator: ctx.mediator.clone(),
            class_drivers: Mutex::new(class_drivers.iter().cloned().collect()),
            known: Mutex::new(BTreeSet::new()),
            drivers: Mutex::new(BTreeMap::new()),
            poll_every: AtomicU64::new(poll_every),
            ticks_since_poll: AtomicU64::new(0),
        });
        Self::install_services(&ctx.mediator, &state)?;

        let table = CapabilityTable::new()
            .getter("device_count", {
                let state = state.clone();
                move || Ok(json!(state.known.lock().len()))
            })
            .getter("poll_every", {
                let state = state.clone();
                move || Ok(json!(state.poll_every.load(Ordering::SeqCst)))
            })
            .setter("poll_every", {
                let state = state.clone();
                move |value| {
                    let ticks = value
                        .as_u64()
                        .filter(|n| *n > 0)
                        .ok_or("poll_every must be a positive integer")?;
                    state.poll_every.store(ticks, Ordering::SeqCst);
                    Ok(())
                }
            })
            .getter("drivers", {
                let state = state.clone();
                move || {
                    let drivers: serde_json::Map<String, Value> = state
                        .drivers
                        .lock()
                        .iter()
                        .map(|(uid, instance)| (format!("{uid:08x}"), json!(instance)))
                        .collect();
                    Ok(Value::Object(drivers))
                }
            })
            .method("scan", {
                let state = state.clone();
                move |_| Ok(json!(state.poll()))
            });

        let devices = state.poll();
        debug!(instance = %ctx.instance_name, devices, "Sensor bus master ready");

        Ok(Self { table, state })
    }

    /// Publishes the `sensorbus.*` methods, hooks and interrupt, and
    /// attaches the poll timer to `manager.tick`.
    fn install_services(mediator: &Mediator, state: &Arc<MasterState>) -> Result<(), CallbackError> {
        let installed = [
            mediator.install_custom_method(METHOD_DEVICE_INFO, {
                let state = state.clone();
                method_callback(move |args, kwargs| Ok(state.device_info(uid_arg(args, kwargs, 0)?)))
            }),
            mediator.install_custom_method(METHOD_READ_OBJECT, {
                let state = state.clone();
                method_callback(move |args, kwargs| {
                    let address = address_arg(args, kwargs)?;
                    let index = index_arg(args, kwargs)?;
                    state
                        .bus
                        .read_object(address, index)
                        .map_err(|e| CallbackError::new(e.to_string()))
                })
            }),
            mediator.install_custom_method(METHOD_WRITE_OBJECT, {
                let state = state.clone();
                method_callback(move |args, kwargs| {
                    let address = address_arg(args, kwargs)?;
                    let index = index_arg(args, kwargs)?;
                    let value = args
                        .get(2)
                        .or_else(|| kwargs.get("value"))
                        .cloned()
                        .ok_or("argument 'value' is required")?;
                    state
                        .bus
                        .write_object(address, index, value)
                        .map(|()| Value::Null)
                        .map_err(|e| CallbackError::new(e.to_string()))
                })
            }),
            mediator.install_custom_method(METHOD_REGISTER_CLASS_DRIVER, {
                let state = state.clone();
                method_callback(move |args, kwargs| {
                    let component_type = args
                        .first()
                        .or_else(|| kwargs.get("component_type"))
                        .and_then(Value::as_str)
                        .ok_or("argument 'component_type' must be a string")?
                        .to_string();
                    let class = uint_arg(args, kwargs, 1, "device_class")?;
                    let class = u32::try_from(class)
                        .map_err(|_| CallbackError::new(format!("device class {class} is out of range")))?;
                    state
                        .class_drivers
                        .lock()
                        .insert(device_class(class), component_type);
                    Ok(Value::Null)
                })
            }),
            mediator.install_custom_hook(DEVICE_FOUND_HOOK),
            mediator.install_custom_hook(DEVICE_LOST_HOOK),
            mediator.install_interrupt(SCAN_INTERRUPT, {
                let state = state.clone();
                interrupt_callback(move |_| {
                    state.poll();
                    Ok(())
                })
            }),
        ];
        if installed.contains(&false) {
            return Err(CallbackError::new("sensorbus services are already installed"));
        }

        let ticker = state.clone();
        mediator
            .attach_system_hook(
                SystemHook::Tick.as_str(),
                hook_callback(move |_| {
                    ticker.tick();
                    Ok(false)
                }),
                HookAction::None,
                HookArgument::None,
            )
            .ok_or("could not attach to manager.tick")?;
        Ok(())
    }
}

impl Component for SensorBusMaster {
    fn capabilities(&self) -> &CapabilityTable {
        &self.table
    }

    fn on_unload(&self) {
        self.state.unload_drivers();
    }

    fn communicate(&self, notice: &ManagerNotice) {
        debug!(
            instance = %self.state.mediator.instance_name(),
            reason = %notice.reason,
            error = ?notice.error,
            "Sensor bus request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_arg_positional_or_keyword() {
        let kwargs = kwargs! { "index" => 4 };
        assert_eq!(uint_arg(&[json!(2)], &kwargs, 0, "address"), Ok(2));
        assert_eq!(uint_arg(&[json!(2)], &kwargs, 1, "index"), Ok(4));
        assert!(uint_arg(&[json!(-1)], &Kwargs::new(), 0, "address").is_err());
        assert!(uint_arg(&[], &Kwargs::new(), 0, "address").is_err());
    }

    #[test]
    fn test_narrowing_args() {
        assert_eq!(address_arg(&[json!(3)], &Kwargs::new()), Ok(3));
        assert!(address_arg(&[json!(300)], &Kwargs::new()).is_err());
        assert!(index_arg(&[json!(1), json!(70_000)], &Kwargs::new()).is_err());
        assert_eq!(uid_arg(&[json!(0x0001_0001)], &Kwargs::new(), 0), Ok(0x0001_0001));
    }

    #[test]
    fn test_descriptor() {
        let descriptor = descriptor();
        assert!(!descriptor.allows_multiple_instances());
        assert!(descriptor.properties.contains_key("poll_every"));
        assert!(descriptor.methods.contains_key("scan"));
    }
}
