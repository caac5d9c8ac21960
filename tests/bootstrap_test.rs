//! End-to-end daemon flow without the runtime: configuration, discovery,
//! hook rules, autoload, heartbeat and shutdown.

use std::sync::Arc;

use serde_json::json;

use modhost_core::config::AppConfig;
use modhost_plugin::activation::ActivationOutcome;
use modhost_plugin::{ModuleManager, Owner};
use modhost_plugin_sdk::rules::HookRule;
use plugin_sensor_bus::SensorBusPlugin;
use plugin_sensor_bus::bus::mock::MockBus;
use plugin_sensor_bus::node::TEMPERATURE_OBJECT;

const CONFIG: &str = r#"
    [engine]
    max_replay_depth = 8
    tick_interval_ms = 50

    [[components.autoload]]
    component = "sensorbus"
    args = { poll_every = 1 }

    [[components.rules]]
    name = "valve-driver"
    hook = "sensorbus.device_found"
    requires = "sensorbus"
    when = { class = 131072 }
    action = "load"
    target = "sensornode"
"#;

const PROBE: u32 = 0x0001_0001;
const VALVE: u32 = 0x0002_0001;

#[test]
fn test_configured_daemon_lifecycle() {
    let config = AppConfig::from_toml_str(CONFIG).expect("config");

    let bus = Arc::new(MockBus::new());
    bus.attach(PROBE, "probe");
    bus.set_object(PROBE, TEMPERATURE_OBJECT, json!(19.0), false);

    let manager = ModuleManager::new(config.engine.clone());
    let report = manager.discover(&SensorBusPlugin::new(bus.clone()));
    assert_eq!(report.discovered, vec!["sensorbus", "sensornode"]);

    // Submitted before autoload, so the rule waits for the bus master.
    let rule = Arc::new(HookRule::from_config(&config.components.rules[0]).expect("rule"));
    assert!(manager.submit_activation(rule.clone()).is_deferred());

    for entry in &config.components.autoload {
        manager.load(&entry.component, entry.kwargs()).expect("autoload");
    }
    assert!(manager.pending_activations().is_empty());
    assert!(rule.attachment().is_some());

    // The master drives the probe itself; the valve is picked up by the rule.
    bus.attach(VALVE, "valve");
    let tick = manager.tick();
    assert!(tick.is_clean());

    let loaded = manager.list_loaded();
    assert_eq!(loaded.get("sensornode-00010001"), Some(&Owner::instance("sensorbus")));
    assert_eq!(loaded.get("sensornode"), Some(&Owner::Manager));
    assert_eq!(manager.get_property("sensornode", "uid").value(), Some(&json!(VALVE)));
    assert_eq!(
        manager.get_property("sensornode-00010001", "temperature").value(),
        Some(&json!(19.0))
    );

    assert_eq!(manager.unload_all(), 3);
    assert!(manager.loaded_instances().is_empty());
    assert!(!rule.detach(&manager), "the hook went away with its provider");
}

#[test]
fn test_rule_for_missing_hook_is_cancelled() {
    let toml = r#"
        [[components.rules]]
        name = "nothing"
        hook = "no.such.hook"
    "#;
    let config = AppConfig::from_toml_str(toml).expect("config");
    let manager = ModuleManager::new(config.engine.clone());

    let rule = Arc::new(HookRule::from_config(&config.components.rules[0]).expect("rule"));
    assert!(matches!(
        manager.submit_activation(rule),
        ActivationOutcome::Cancelled(_)
    ));
}
