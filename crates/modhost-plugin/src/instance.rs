//! A loaded, named component instance and its checked property and method
//! access.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use modhost_core::types::Kwargs;

use crate::component::Component;
use crate::descriptor::ComponentDescriptor;
use crate::error::{EngineError, MethodError};
use crate::owner::Owner;

/// Registry record of a live instance.
pub struct LoadedInstance {
    name: String,
    descriptor: Arc<ComponentDescriptor>,
    component: Arc<dyn Component>,
    kwargs: Kwargs,
    owner: Owner,
}

impl LoadedInstance {
    pub(crate) fn new(
        name: String,
        descriptor: Arc<ComponentDescriptor>,
        component: Arc<dyn Component>,
        kwargs: Kwargs,
        owner: Owner,
    ) -> Self {
        Self {
            name,
            descriptor,
            component,
            kwargs,
            owner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_type(&self) -> &str {
        &self.descriptor.component_type
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    /// Construction kwargs, including `loaded_by`.
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// The owner allowed to unload this instance.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Returns one of the construction kwargs.
    pub fn loaded_kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Reads a declared property. An unbound getter reads as `null`.
    pub fn get_property(&self, property: &str) -> Result<Value, EngineError> {
        let declared = self.descriptor.properties.get(property).ok_or_else(|| {
            EngineError::InvalidProperty {
                instance: self.name.clone(),
                property: property.to_string(),
            }
        })?;

        if !declared.permission.can_read() {
            return Err(EngineError::PropertyPermission {
                instance: self.name.clone(),
                property: property.to_string(),
                permission: declared.permission,
            });
        }

        match self.component.capabilities().get_getter(property) {
            Some(getter) => Ok(getter()?),
            None => Ok(Value::Null),
        }
    }

    /// Writes a declared property. An unbound setter ignores the value.
    pub fn set_property(&self, property: &str, value: Value) -> Result<(), EngineError> {
        let declared = self.descriptor.properties.get(property).ok_or_else(|| {
            EngineError::InvalidProperty {
                instance: self.name.clone(),
                property: property.to_string(),
            }
        })?;

        if !declared.permission.can_write() {
            return Err(EngineError::PropertyPermission {
                instance: self.name.clone(),
                property: property.to_string(),
                permission: declared.permission,
            });
        }

        match self.component.capabilities().get_setter(property) {
            Some(setter) => Ok(setter(value)?),
            None => Ok(()),
        }
    }

    /// Calls a declared method after checking its arguments.
    pub fn call_method(&self, method: &str, kwargs: &Kwargs) -> Result<Value, EngineError> {
        let declared = self
            .descriptor
            .methods
            .get(method)
            .ok_or_else(|| MethodError::Unknown {
                method: method.to_string(),
            })?;

        declared.check_args(method, kwargs)?;

        let Some(call) = self.component.capabilities().get_method(method) else {
            return Ok(Value::Null);
        };

        call(kwargs).map_err(|e| {
            EngineError::Method(MethodError::Failed {
                method: method.to_string(),
                message: e.to_string(),
            })
        })
    }
}

impl fmt::Debug for LoadedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedInstance")
            .field("name", &self.name)
            .field("component_type", &self.descriptor.component_type)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
