//! Static metadata a component type exposes before instantiation.

pub mod structure;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use modhost_core::types::Kwargs;

use crate::component::ComponentFactory;
use crate::error::MethodError;

pub use structure::{MethodArgStructure, MethodStructure, ModuleInfo, ModuleStructure, PropertyStructure};

/// Data type tags for properties, method arguments and return values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int,
    Float,
    String,
    #[default]
    Void,
    IntList,
    FloatList,
    StringList,
    VoidList,
    Boolean,
    Dict,
}

/// Access permission of a property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl Permission {
    /// Returns whether `get` is allowed.
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Returns whether `set` is allowed.
    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read-only"),
            Self::Write => write!(f, "write-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Capability flags of a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// More than one instance of the type may be loaded at once.
    MultiInstanceAllowed,
}

/// A named construction argument with help text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleArgument {
    /// Argument name.
    pub name: String,
    /// Help text.
    pub help: String,
}

impl ModuleArgument {
    /// Creates a module argument.
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
        }
    }
}

/// Declared property of a component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub description: String,
    pub permission: Permission,
    pub data_type: DataType,
}

impl PropertyDescriptor {
    /// Creates a property descriptor.
    pub fn new(description: impl Into<String>, permission: Permission, data_type: DataType) -> Self {
        Self {
            description: description.into(),
            permission,
            data_type,
        }
    }
}

/// Declared argument of a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodArgument {
    pub description: String,
    pub required: bool,
    pub data_type: DataType,
}

/// Declared method of a component type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Method description.
    pub description: String,
    /// Arguments, in declaration order.
    pub args: IndexMap<String, MethodArgument>,
    /// Return type.
    pub returns: DataType,
}

impl MethodDescriptor {
    /// Creates a method descriptor with no arguments.
    pub fn new(description: impl Into<String>, returns: DataType) -> Self {
        Self {
            description: description.into(),
            args: IndexMap::new(),
            returns,
        }
    }

    /// Declares an argument.
    pub fn with_arg(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
        data_type: DataType,
    ) -> Self {
        self.args.insert(
            name.into(),
            MethodArgument {
                description: description.into(),
                required,
                data_type,
            },
        );
        self
    }

    /// Checks call arguments against the declaration.
    pub fn check_args(&self, method: &str, kwargs: &Kwargs) -> Result<(), MethodError> {
        if let Some((name, _)) = self
            .args
            .iter()
            .find(|(name, arg)| arg.required && !kwargs.contains_key(name.as_str()))
        {
            return Err(MethodError::MissingArgument {
                method: method.to_string(),
                argument: name.clone(),
            });
        }

        if let Some(name) = kwargs.keys().find(|name| !self.args.contains_key(name.as_str())) {
            return Err(MethodError::UnexpectedArgument {
                method: method.to_string(),
                argument: name.clone(),
            });
        }

        Ok(())
    }
}

/// Identity, arguments, capabilities, properties and methods of a
/// component type. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Type name, unique within a registry.
    pub component_type: String,
    /// Human description.
    pub description: String,
    /// Arguments that must be present in the load kwargs.
    #[serde(default)]
    pub required_args: Vec<ModuleArgument>,
    /// Arguments that may be present in the load kwargs.
    #[serde(default)]
    pub optional_args: Vec<ModuleArgument>,
    /// Capability flags.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Declared properties.
    #[serde(default)]
    pub properties: IndexMap<String, PropertyDescriptor>,
    /// Declared methods.
    #[serde(default)]
    pub methods: IndexMap<String, MethodDescriptor>,
    /// Fixed suffix appended on name collision instead of a counter.
    #[serde(default)]
    pub multi_instance_suffix: Option<String>,
}

impl ComponentDescriptor {
    /// Creates an empty descriptor.
    pub fn new(component_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            description: description.into(),
            required_args: Vec::new(),
            optional_args: Vec::new(),
            capabilities: Vec::new(),
            properties: IndexMap::new(),
            methods: IndexMap::new(),
            multi_instance_suffix: None,
        }
    }

    pub fn with_required_arg(mut self, name: impl Into<String>, help: impl Into<String>) -> Self {
        self.required_args.push(ModuleArgument::new(name, help));
        self
    }

    pub fn with_optional_arg(mut self, name: impl Into<String>, help: impl Into<String>) -> Self {
        self.optional_args.push(ModuleArgument::new(name, help));
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Shorthand for [`Capability::MultiInstanceAllowed`].
    pub fn multi_instance(self) -> Self {
        self.with_capability(Capability::MultiInstanceAllowed)
    }

    /// Sets a fixed collision suffix.
    pub fn with_instance_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.multi_instance_suffix = Some(suffix.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, property: PropertyDescriptor) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, method: MethodDescriptor) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    /// Returns whether several instances may coexist.
    pub fn allows_multiple_instances(&self) -> bool {
        self.capabilities.contains(&Capability::MultiInstanceAllowed)
    }

    /// Returns the first required argument absent from `kwargs`.
    pub fn missing_argument(&self, kwargs: &Kwargs) -> Option<&ModuleArgument> {
        self.required_args
            .iter()
            .find(|arg| !kwargs.contains_key(&arg.name))
    }

    /// Returns the identity pair used in structure documents.
    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            module_type: self.component_type.clone(),
            module_desc: self.description.clone(),
        }
    }
}

/// A discovered component type: its descriptor and the factory that
/// builds instances of it.
#[derive(Clone)]
pub struct ComponentRegistration {
    /// Shared descriptor.
    pub descriptor: Arc<ComponentDescriptor>,
    /// Instance factory.
    pub factory: ComponentFactory,
}

impl ComponentRegistration {
    /// Bundles a descriptor with a factory.
    pub fn new(descriptor: ComponentDescriptor, factory: ComponentFactory) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            factory,
        }
    }

    /// Returns the type name.
    pub fn component_type(&self) -> &str {
        &self.descriptor.component_type
    }
}

impl fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("component_type", &self.descriptor.component_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(value: serde_json::Value) -> Kwargs {
        value.as_object().cloned().unwrap_or_default()
    }

    fn read_object() -> MethodDescriptor {
        MethodDescriptor::new("read an object", DataType::Dict)
            .with_arg("index", "object index", true, DataType::Int)
            .with_arg("timeout", "seconds", false, DataType::Float)
    }

    #[test]
    fn test_check_args_accepts_declared() {
        let method = read_object();
        assert!(method.check_args("read", &kwargs(json!({"index": 1}))).is_ok());
        assert!(
            method
                .check_args("read", &kwargs(json!({"index": 1, "timeout": 0.5})))
                .is_ok()
        );
    }

    #[test]
    fn test_check_args_missing_required() {
        let err = read_object()
            .check_args("read", &kwargs(json!({"timeout": 1.0})))
            .unwrap_err();
        assert_eq!(
            err,
            MethodError::MissingArgument {
                method: "read".into(),
                argument: "index".into()
            }
        );
    }

    #[test]
    fn test_check_args_unexpected() {
        let err = read_object()
            .check_args("read", &kwargs(json!({"index": 1, "bogus": true})))
            .unwrap_err();
        assert!(matches!(err, MethodError::UnexpectedArgument { argument, .. } if argument == "bogus"));
    }

    #[test]
    fn test_missing_argument() {
        let descriptor = ComponentDescriptor::new("sensornode", "node")
            .with_required_arg("uid", "node id")
            .with_optional_arg("label", "display label");
        assert_eq!(
            descriptor.missing_argument(&Kwargs::new()).map(|a| a.name.as_str()),
            Some("uid")
        );
        assert!(descriptor.missing_argument(&kwargs(json!({"uid": 7}))).is_none());
    }

    #[test]
    fn test_permissions() {
        assert!(Permission::Read.can_read());
        assert!(!Permission::Read.can_write());
        assert!(Permission::Write.can_write());
        assert!(!Permission::Write.can_read());
        assert!(Permission::ReadWrite.can_read() && Permission::ReadWrite.can_write());
    }

    #[test]
    fn test_capability_not_duplicated() {
        let descriptor = ComponentDescriptor::new("beta", "b").multi_instance().multi_instance();
        assert_eq!(descriptor.capabilities.len(), 1);
        assert!(descriptor.allows_multiple_instances());
    }
}
