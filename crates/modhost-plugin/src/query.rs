//! Query surface for callers outside the engine: UIs, script engines and
//! other components.
//!
//! Query operations never return `Err`. Failures come back as
//! [`QueryResult::Error`] with a stable [`QueryErrorCode`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use modhost_core::types::Kwargs;

use crate::descriptor::{
    Capability, ComponentDescriptor, MethodStructure, ModuleInfo, ModuleStructure, Permission,
    PropertyStructure,
};
use crate::error::EngineError;
use crate::manager::ModuleManager;
use crate::owner::Owner;

/// Stable error codes of the query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorCode {
    InvalidInstance,
    InvalidModule,
    InvalidProperty,
    /// Read of a write-only property.
    WriteOnly,
    /// Write of a read-only property.
    ReadOnly,
    CallFailed,
}

impl From<&EngineError> for QueryErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::NotLoaded(_) | EngineError::InstanceRequired(_) => Self::InvalidInstance,
            EngineError::UnknownComponent(_) | EngineError::InvalidStructure(_) => Self::InvalidModule,
            EngineError::InvalidProperty { .. } => Self::InvalidProperty,
            EngineError::PropertyPermission { permission, .. } => match permission {
                Permission::Write => Self::WriteOnly,
                Permission::Read | Permission::ReadWrite => Self::ReadOnly,
            },
            _ => Self::CallFailed,
        }
    }
}

/// Tagged result: `{"status":"ok","value":…}` or
/// `{"status":"error","error":"<code>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult<T> {
    Ok { value: T },
    Error { error: QueryErrorCode },
}

impl<T> QueryResult<T> {
    pub fn ok(value: T) -> Self {
        Self::Ok { value }
    }

    pub fn error(error: QueryErrorCode) -> Self {
        Self::Error { error }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Returns the value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Ok { value } => Some(value),
            Self::Error { .. } => None,
        }
    }

    /// Returns the error code, if any.
    pub fn error_code(&self) -> Option<QueryErrorCode> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { error } => Some(*error),
        }
    }

    pub fn into_result(self) -> Result<T, QueryErrorCode> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Error { error } => Err(error),
        }
    }
}

impl<T> From<Result<T, EngineError>> for QueryResult<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::error(QueryErrorCode::from(&e)),
        }
    }
}

impl ModuleManager {
    fn query_descriptor<T>(
        &self,
        component_type: &str,
        f: impl FnOnce(&ComponentDescriptor) -> T,
    ) -> QueryResult<T> {
        match self.registry().descriptor(component_type) {
            Some(descriptor) => QueryResult::ok(f(descriptor.as_ref())),
            None => {
                warn!(component = %component_type, "Requested component type not found");
                QueryResult::error(QueryErrorCode::InvalidModule)
            }
        }
    }

    /// Discovered component types, in discovery order.
    pub fn list_discovered(&self) -> Vec<String> {
        self.registry().list_discovered()
    }

    /// Loaded instances and their owners, in load order.
    pub fn list_loaded(&self) -> IndexMap<String, Owner> {
        self.registry().list_loaded()
    }

    /// Loaded instance names, in load order.
    pub fn loaded_instances(&self) -> Vec<String> {
        self.registry().list_loaded().into_keys().collect()
    }

    pub fn instances_of_type(&self, component_type: &str) -> Vec<String> {
        self.registry().instances_of_type(component_type)
    }

    /// The component type of a loaded instance.
    pub fn instance_type(&self, instance_name: &str) -> QueryResult<String> {
        match self.registry().get(instance_name) {
            Some(instance) => QueryResult::ok(instance.component_type().to_string()),
            None => {
                warn!(instance = %instance_name, "Requested instance not found");
                QueryResult::error(QueryErrorCode::InvalidInstance)
            }
        }
    }

    pub fn module_capabilities(&self, component_type: &str) -> QueryResult<Vec<Capability>> {
        self.query_descriptor(component_type, |d| d.capabilities.clone())
    }

    pub fn module_info(&self, component_type: &str) -> QueryResult<ModuleInfo> {
        self.query_descriptor(component_type, ComponentDescriptor::info)
    }

    /// The full structure document of a type.
    pub fn module_structure(&self, component_type: &str) -> QueryResult<ModuleStructure> {
        self.query_descriptor(component_type, ComponentDescriptor::structure)
    }

    pub fn module_properties(&self, component_type: &str) -> QueryResult<IndexMap<String, PropertyStructure>> {
        self.query_descriptor(component_type, ComponentDescriptor::property_structures)
    }

    pub fn module_methods(&self, component_type: &str) -> QueryResult<IndexMap<String, MethodStructure>> {
        self.query_descriptor(component_type, ComponentDescriptor::method_structures)
    }

    /// Reads a property of a loaded instance.
    pub fn get_property(&self, instance_name: &str, property: &str) -> QueryResult<Value> {
        let result = self
            .registry()
            .get(instance_name)
            .ok_or_else(|| EngineError::NotLoaded(instance_name.to_string()))
            .and_then(|instance| instance.get_property(property));
        if let Err(e) = &result {
            warn!(instance = %instance_name, property = %property, error = %e, "Property read failed");
        }
        result.into()
    }

    /// Writes a property of a loaded instance. Values are not type-checked.
    pub fn set_property(&self, instance_name: &str, property: &str, value: Value) -> QueryResult<()> {
        let result = self
            .registry()
            .get(instance_name)
            .ok_or_else(|| EngineError::NotLoaded(instance_name.to_string()))
            .and_then(|instance| instance.set_property(property, value));
        if let Err(e) = &result {
            warn!(instance = %instance_name, property = %property, error = %e, "Property write failed");
        }
        result.into()
    }

    /// Calls a method of a loaded instance with keyword arguments.
    pub fn call_method(&self, instance_name: &str, method: &str, kwargs: &Kwargs) -> QueryResult<Value> {
        let result = self
            .registry()
            .get(instance_name)
            .ok_or_else(|| EngineError::NotLoaded(instance_name.to_string()))
            .and_then(|instance| instance.call_method(method, kwargs));
        if let Err(e) = &result {
            warn!(instance = %instance_name, method = %method, error = %e, "Method call failed");
        }
        result.into()
    }
}
