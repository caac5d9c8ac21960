//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use modhost_plugin::prelude::*;

/// Every notice any fixture instance received, with the recipient's name.
pub type NoticeLog = Arc<Mutex<Vec<(String, ManagerNotice)>>>;

/// Construction kwargs, per instance, in construction order.
pub type ConstructionLog = Arc<Mutex<Vec<(String, Kwargs)>>>;

/// A fixture component: a capability table plus a notice recorder.
pub struct Probe {
    name: String,
    table: CapabilityTable,
    notices: NoticeLog,
}

impl Component for Probe {
    fn capabilities(&self) -> &CapabilityTable {
        &self.table
    }

    fn communicate(&self, notice: &ManagerNotice) {
        self.notices.lock().push((self.name.clone(), notice.clone()));
    }
}

/// A manager preloaded with the fixture types.
///
/// - `alpha`: single instance
/// - `beta`: multi-instance; each instance installs the custom hook
///   `<instance>.ready`
/// - `gamma`: multi-instance, no behaviour
/// - `sensor`: single instance with properties and methods
pub struct TestEngine {
    pub manager: ModuleManager,
    pub notices: NoticeLog,
    pub constructed: ConstructionLog,
    pub mediators: Arc<Mutex<HashMap<String, Mediator>>>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_manager(ModuleManager::default())
    }

    pub fn with_manager(manager: ModuleManager) -> Self {
        let engine = Self {
            manager,
            notices: Arc::default(),
            constructed: Arc::default(),
            mediators: Arc::default(),
        };
        engine.register(ComponentDescriptor::new("alpha", "single instance"));
        engine.register_with(
            ComponentDescriptor::new("beta", "multi-instance hook provider").multi_instance(),
            |ctx| {
                ctx.mediator
                    .install_custom_hook(&format!("{}.ready", ctx.instance_name));
                CapabilityTable::new()
            },
        );
        engine.register(ComponentDescriptor::new("gamma", "hook-loaded").multi_instance());
        engine.register_with(sensor_descriptor(), sensor_capabilities);
        engine
    }

    /// Registers a type whose instances have no bindings.
    pub fn register(&self, descriptor: ComponentDescriptor) {
        self.register_with(descriptor, |_| CapabilityTable::new());
    }

    /// Registers a type; `build` runs inside the factory and may use the
    /// mediator.
    pub fn register_with<F>(&self, descriptor: ComponentDescriptor, build: F)
    where
        F: Fn(&ComponentContext) -> CapabilityTable + Send + Sync + 'static,
    {
        let notices = self.notices.clone();
        let constructed = self.constructed.clone();
        let mediators = self.mediators.clone();
        self.manager.insert_component(ComponentRegistration::new(
            descriptor,
            factory(move |ctx| {
                constructed
                    .lock()
                    .push((ctx.instance_name.clone(), ctx.kwargs.clone()));
                mediators
                    .lock()
                    .insert(ctx.instance_name.clone(), ctx.mediator.clone());
                let table = build(&ctx);
                Ok(Arc::new(Probe {
                    name: ctx.instance_name.clone(),
                    table,
                    notices: notices.clone(),
                }) as Arc<dyn Component>)
            }),
        ));
    }

    pub fn notices_for(&self, instance: &str) -> Vec<ManagerNotice> {
        self.notices
            .lock()
            .iter()
            .filter(|(name, _)| name == instance)
            .map(|(_, notice)| notice.clone())
            .collect()
    }

    pub fn construction_kwargs(&self, instance: &str) -> Option<Kwargs> {
        self.constructed
            .lock()
            .iter()
            .rev()
            .find(|(name, _)| name == instance)
            .map(|(_, kwargs)| kwargs.clone())
    }

    /// The mediator handed to `instance` at construction.
    pub fn mediator_of(&self, instance: &str) -> Mediator {
        self.mediators
            .lock()
            .get(instance)
            .cloned()
            .unwrap_or_else(|| Mediator::detached(instance))
    }
}

pub fn sensor_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new("sensor", "property and method fixture")
        .with_property(
            "level",
            PropertyDescriptor::new("current level", Permission::Read, DataType::Int),
        )
        .with_property(
            "target",
            PropertyDescriptor::new("target level", Permission::Write, DataType::Int),
        )
        .with_property(
            "mode",
            PropertyDescriptor::new("operating mode", Permission::ReadWrite, DataType::String),
        )
        .with_method(
            "measure",
            MethodDescriptor::new("measure one channel", DataType::Float)
                .with_arg("channel", "channel index", true, DataType::Int)
                .with_arg("gain", "multiplier", false, DataType::Float),
        )
        .with_method("explode", MethodDescriptor::new("always fails", DataType::Void))
}

fn sensor_capabilities(_ctx: &ComponentContext) -> CapabilityTable {
    let mode = Arc::new(Mutex::new(json!("idle")));
    let reader = mode.clone();
    CapabilityTable::new()
        .getter("level", || Ok(json!(42)))
        .setter("target", |_| Ok(()))
        .getter("mode", move || Ok(reader.lock().clone()))
        .setter("mode", move |value| {
            *mode.lock() = value;
            Ok(())
        })
        .method("measure", |kwargs| {
            let channel = kwargs.get_i64("channel").unwrap_or_default();
            let gain = kwargs.get("gain").and_then(Value::as_f64).unwrap_or(1.0);
            Ok(json!(channel as f64 * gain))
        })
        .method("explode", |_| Err(CallbackError::new("sensor fault")))
}
