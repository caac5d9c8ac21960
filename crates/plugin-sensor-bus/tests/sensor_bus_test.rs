//! Bus master and node driver running on the mock bus.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use modhost_core::types::{Kwargs, KwargsExt};
use modhost_plugin::hooks::definitions::{HookAttachment, HookKind, hook_callback};
use modhost_plugin::{EngineError, HookArgument, ModuleManager, Owner, QueryErrorCode, kwargs};
use plugin_sensor_bus::bus::mock::MockBus;
use plugin_sensor_bus::master::{
    DEVICE_FOUND_HOOK, METHOD_DEVICE_INFO, METHOD_READ_OBJECT, METHOD_REGISTER_CLASS_DRIVER, SCAN_INTERRUPT,
};
use plugin_sensor_bus::node::{SETPOINT_OBJECT, TEMPERATURE_OBJECT};
use plugin_sensor_bus::SensorBusPlugin;

const PROBE: u32 = 0x0001_0001;
const VALVE: u32 = 0x0002_0001;

fn probe_instance(uid: u32) -> String {
    format!("sensornode-{uid:08x}")
}

fn setup() -> (ModuleManager, Arc<MockBus>) {
    let bus = Arc::new(MockBus::new());
    bus.attach(PROBE, "probe");
    bus.set_object(PROBE, TEMPERATURE_OBJECT, json!(21.5), false);
    bus.set_object(PROBE, SETPOINT_OBJECT, json!(20.0), true);
    bus.attach(VALVE, "valve");

    let manager = ModuleManager::default();
    let report = manager.discover(&SensorBusPlugin::new(bus.clone()));
    assert!(report.is_complete());
    (manager, bus)
}

#[test]
fn test_node_driver_is_discovered_after_master() {
    let (manager, _) = setup();
    assert_eq!(manager.list_discovered(), vec!["sensorbus", "sensornode"]);
}

#[test]
fn test_master_loads_drivers_for_known_classes() {
    let (manager, _) = setup();

    manager.load("sensorbus", Kwargs::new()).expect("load master");

    let loaded = manager.list_loaded();
    assert_eq!(loaded.get("sensorbus"), Some(&Owner::Manager));
    assert_eq!(loaded.get(&probe_instance(PROBE)), Some(&Owner::instance("sensorbus")));
    assert_eq!(manager.instances_of_type("sensornode"), vec![probe_instance(PROBE)]);

    assert_eq!(manager.get_property("sensorbus", "device_count").value(), Some(&json!(2)));
    assert_eq!(
        manager.get_property("sensorbus", "drivers").value(),
        Some(&json!({ "00010001": probe_instance(PROBE) }))
    );
}

#[test]
fn test_node_reads_and_writes_through_master() {
    let (manager, _) = setup();
    manager.load("sensorbus", Kwargs::new()).expect("load master");
    let node = probe_instance(PROBE);

    assert_eq!(manager.get_property(&node, "temperature").value(), Some(&json!(21.5)));
    assert_eq!(manager.get_property(&node, "name").value(), Some(&json!("probe")));
    assert_eq!(manager.get_property(&node, "address").value(), Some(&json!(1)));

    assert!(manager.set_property(&node, "setpoint", json!(23.0)).is_ok());
    assert_eq!(manager.get_property(&node, "setpoint").value(), Some(&json!(23.0)));
    assert_eq!(
        manager.set_property(&node, "temperature", json!(0)).error_code(),
        Some(QueryErrorCode::ReadOnly)
    );

    let reading = manager.call_method(&node, "read_object", &kwargs! { "index" => 1 });
    assert_eq!(reading.value(), Some(&json!({ "index": 1, "value": 21.5 })));
    assert_eq!(
        manager.call_method(&node, "read_object", &kwargs! { "index" => 9 }).error_code(),
        Some(QueryErrorCode::CallFailed)
    );
}

#[test]
fn test_custom_methods_are_callable_by_anyone() {
    let (manager, _) = setup();
    manager.load("sensorbus", Kwargs::new()).expect("load master");

    let info = manager
        .call_custom_method(METHOD_DEVICE_INFO, &[json!(VALVE)], &Kwargs::new())
        .expect("device info");
    assert_eq!(info["name"], json!("valve"));
    assert_eq!(info["address"], json!(2));

    let missing = manager
        .call_custom_method(METHOD_DEVICE_INFO, &[json!(0x0009_0009)], &Kwargs::new())
        .expect("unknown devices yield null");
    assert!(missing.is_null());

    let temperature = manager
        .call_custom_method(METHOD_READ_OBJECT, &[], &kwargs! { "address" => 1, "index" => 1 })
        .expect("keyword arguments");
    assert_eq!(temperature, json!(21.5));

    let err = manager
        .call_custom_method(METHOD_READ_OBJECT, &[json!(9), json!(1)], &Kwargs::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::Callback(_)));
}

#[test]
fn test_interrupt_scans_and_fires_device_found() {
    let (manager, bus) = setup();
    manager.load("sensorbus", Kwargs::new()).expect("load master");

    let found = Arc::new(Mutex::new(Vec::new()));
    let sink = found.clone();
    manager
        .attach_custom_hook(
            DEVICE_FOUND_HOOK,
            HookAttachment::new(
                Owner::Manager,
                hook_callback(move |event| {
                    sink.lock().push(event.kwargs.get_i64("uid").unwrap_or_default());
                    Ok(false)
                }),
            ),
        )
        .expect("attach");

    const SECOND_PROBE: u32 = 0x0001_0002;
    bus.attach(SECOND_PROBE, "second probe");
    manager.raise_interrupt(SCAN_INTERRUPT, &Kwargs::new()).expect("raise");

    assert_eq!(*found.lock(), vec![i64::from(SECOND_PROBE)]);
    assert!(manager.is_loaded(&probe_instance(SECOND_PROBE)));
}

#[test]
fn test_tick_polling_unloads_removed_devices() {
    let (manager, bus) = setup();
    manager
        .load("sensorbus", kwargs! { "poll_every" => 2 })
        .expect("load master");
    let node = probe_instance(PROBE);

    bus.detach(PROBE);
    manager.tick();
    assert!(manager.is_loaded(&node), "first tick does not poll yet");

    manager.tick();
    assert!(!manager.is_loaded(&node));
    assert_eq!(manager.get_property("sensorbus", "device_count").value(), Some(&json!(1)));
}

#[test]
fn test_poll_interval_is_writable() {
    let (manager, bus) = setup();
    manager.load("sensorbus", Kwargs::new()).expect("load master");

    assert!(manager.set_property("sensorbus", "poll_every", json!(1)).is_ok());
    assert_eq!(manager.get_property("sensorbus", "poll_every").value(), Some(&json!(1)));
    assert_eq!(
        manager.set_property("sensorbus", "poll_every", json!(0)).error_code(),
        Some(QueryErrorCode::CallFailed)
    );

    bus.detach(PROBE);
    manager.tick();
    assert!(!manager.is_loaded(&probe_instance(PROBE)));
}

#[test]
fn test_registered_class_driver_is_used_for_new_devices() {
    let (manager, bus) = setup();
    manager.load("sensorbus", Kwargs::new()).expect("load master");
    assert!(!manager.is_loaded(&probe_instance(VALVE)));

    manager
        .call_custom_method(
            METHOD_REGISTER_CLASS_DRIVER,
            &[json!("sensornode"), json!(VALVE)],
            &Kwargs::new(),
        )
        .expect("register");

    const SECOND_VALVE: u32 = 0x0002_0002;
    bus.attach(SECOND_VALVE, "second valve");
    let count = manager.call_method("sensorbus", "scan", &Kwargs::new());

    assert_eq!(count.value(), Some(&json!(3)));
    assert!(manager.is_loaded(&probe_instance(SECOND_VALVE)));
    // Devices seen before the registration keep running driverless.
    assert!(!manager.is_loaded(&probe_instance(VALVE)));
}

#[test]
fn test_unloading_master_cleans_up() {
    let (manager, _) = setup();
    manager.load("sensorbus", Kwargs::new()).expect("load master");

    manager.unload("sensorbus").expect("unload master");

    assert!(manager.loaded_instances().is_empty());
    assert!(!manager.methods().contains(METHOD_READ_OBJECT));
    assert!(!manager.interrupts().contains(SCAN_INTERRUPT));
    assert!(!manager.hooks().contains(HookKind::Custom, DEVICE_FOUND_HOOK));
    let tick_attachments = manager
        .find_hook_attachments(HookKind::System, "manager.tick", &HookArgument::None)
        .expect("system hook exists");
    assert!(tick_attachments.is_empty());

    // Reloading installs everything again.
    manager.load("sensorbus", Kwargs::new()).expect("reload master");
    assert!(manager.is_loaded(&probe_instance(PROBE)));
}

#[test]
fn test_node_cannot_load_without_device() {
    let (manager, _) = setup();
    manager.load("sensorbus", Kwargs::new()).expect("load master");

    let err = manager
        .load("sensornode", kwargs! { "uid" => 0x0001_00FF })
        .unwrap_err();
    assert!(matches!(err, EngineError::ComponentFailed { .. }));

    let err = manager.load("sensornode", Kwargs::new()).unwrap_err();
    assert!(matches!(err, EngineError::MissingArgument { .. }));
}

#[test]
fn test_node_without_master_fails() {
    let (manager, _) = setup();
    let err = manager.load("sensornode", kwargs! { "uid" => PROBE }).unwrap_err();
    assert!(matches!(err, EngineError::ComponentFailed { .. }));
}

#[test]
fn test_structure_document_from_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let document = json!({
        "module_desc": { "module_type": "sensornode", "module_desc": "Trimmed node driver" },
        "module_properties": {
            "temperature": { "property_desc": "Reading", "permissions": "read", "data_type": "float" }
        }
    });
    std::fs::write(dir.path().join("sensornode.json"), document.to_string()).expect("write");

    let bus = Arc::new(MockBus::new());
    let manager = ModuleManager::default();
    manager.discover(&SensorBusPlugin::new(bus).with_structure_dir(dir.path()));

    let properties = manager.module_properties("sensornode").into_result().expect("discovered");
    assert_eq!(properties.keys().collect::<Vec<_>>(), vec!["temperature"]);
    let info = manager.module_info("sensornode").into_result().expect("discovered");
    assert_eq!(info.module_desc, "Trimmed node driver");
}
