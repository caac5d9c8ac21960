//! The contract a concrete component implements.
//!
//! Properties and methods are not looked up by reflection: every component
//! builds a [`CapabilityTable`] at construction time that binds each
//! declared name to a closure.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use modhost_core::events::LOADED_BY_KEY;
use modhost_core::types::Kwargs;

use crate::error::CallbackError;
use crate::mediator::{ManagerNotice, Mediator};
use crate::owner::Owner;

/// Bound property getter.
pub type Getter = Arc<dyn Fn() -> Result<Value, CallbackError> + Send + Sync>;
/// Bound property setter.
pub type Setter = Arc<dyn Fn(Value) -> Result<(), CallbackError> + Send + Sync>;
/// Bound method. Receives the already validated keyword arguments.
pub type MethodCall = Arc<dyn Fn(&Kwargs) -> Result<Value, CallbackError> + Send + Sync>;

/// Builds a component instance from its construction context.
pub type ComponentFactory =
    Arc<dyn Fn(ComponentContext) -> Result<Arc<dyn Component>, CallbackError> + Send + Sync>;

/// Name-indexed bindings for the properties and methods a component
/// declares in its descriptor.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    getters: HashMap<String, Getter>,
    setters: HashMap<String, Setter>,
    methods: HashMap<String, MethodCall>,
}

impl CapabilityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a property getter.
    pub fn getter<F>(mut self, property: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        self.getters.insert(property.into(), Arc::new(f));
        self
    }

    /// Binds a property setter.
    pub fn setter<F>(mut self, property: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.setters.insert(property.into(), Arc::new(f));
        self
    }

    /// Binds a method.
    pub fn method<F>(mut self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Kwargs) -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        self.methods.insert(method.into(), Arc::new(f));
        self
    }

    pub fn get_getter(&self, property: &str) -> Option<&Getter> {
        self.getters.get(property)
    }

    pub fn get_setter(&self, property: &str) -> Option<&Setter> {
        self.setters.get(property)
    }

    pub fn get_method(&self, method: &str) -> Option<&MethodCall> {
        self.methods.get(method)
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("setters", &self.setters.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A live component.
pub trait Component: Send + Sync {
    /// Returns the bindings for declared properties and methods.
    fn capabilities(&self) -> &CapabilityTable;

    /// Called once before the instance is removed from the registry.
    fn on_unload(&self) {}

    /// Receives failures of requests this instance routed through its
    /// mediator, and provider-unloaded notices.
    fn communicate(&self, notice: &ManagerNotice) {
        warn!(reason = %notice.reason, error = ?notice.error, "Unhandled manager notice");
    }
}

/// Everything a factory receives when building an instance.
#[derive(Debug, Clone)]
pub struct ComponentContext {
    /// Final instance name.
    pub instance_name: String,
    /// Component type being built.
    pub component_type: String,
    /// Construction kwargs, including the injected `loaded_by`.
    pub kwargs: Kwargs,
    /// Handle for issuing engine requests as this instance.
    pub mediator: Mediator,
}

impl ComponentContext {
    /// Returns a construction argument.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Returns who requested the load.
    pub fn loaded_by(&self) -> Owner {
        self.kwargs
            .get(LOADED_BY_KEY)
            .and_then(Value::as_str)
            .map(Owner::from)
            .unwrap_or(Owner::Manager)
    }
}

/// Wraps a closure as a [`ComponentFactory`].
pub fn factory<F>(f: F) -> ComponentFactory
where
    F: Fn(ComponentContext) -> Result<Arc<dyn Component>, CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}
