//! Export helpers for publishing a component type to discovery.

use std::sync::Arc;

use tracing::debug;

use modhost_plugin::descriptor::ModuleStructure;
use modhost_plugin::discovery::{ComponentCandidate, DiscoveryContext, Resolution};
use modhost_plugin::{CallbackError, ComponentDescriptor, ComponentFactory, ComponentRegistration, EngineError};

/// A component type ready for discovery: descriptor, factory and the
/// component types that must be discovered before it.
#[derive(Debug, Clone)]
pub struct ComponentExport {
    registration: ComponentRegistration,
    requires: Vec<String>,
}

impl ComponentExport {
    /// Creates an export with no discovery requirements.
    pub fn new(descriptor: ComponentDescriptor, factory: ComponentFactory) -> Self {
        Self {
            registration: ComponentRegistration::new(descriptor, factory),
            requires: Vec::new(),
        }
    }

    /// Creates an export whose descriptor comes from a JSON structure
    /// document.
    pub fn from_structure_json(json: &str, factory: ComponentFactory) -> Result<Self, EngineError> {
        let structure = ModuleStructure::from_json_str(json)?;
        Ok(Self::new(ComponentDescriptor::from_structure(&structure), factory))
    }

    /// Adjusts the descriptor, e.g. to add capabilities or arguments a
    /// structure document does not carry.
    pub fn map_descriptor(self, f: impl FnOnce(ComponentDescriptor) -> ComponentDescriptor) -> Self {
        let descriptor = f(self.registration.descriptor.as_ref().clone());
        Self {
            registration: ComponentRegistration::new(descriptor, self.registration.factory),
            requires: self.requires,
        }
    }

    /// Defers discovery until `component_type` is discovered.
    pub fn requires(mut self, component_type: impl Into<String>) -> Self {
        self.requires.push(component_type.into());
        self
    }

    pub fn component_type(&self) -> &str {
        self.registration.component_type()
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.registration.descriptor
    }

    /// Discovery requirements, in declaration order.
    pub fn requirements(&self) -> &[String] {
        &self.requires
    }

    pub fn into_candidate(self) -> Arc<dyn ComponentCandidate> {
        Arc::new(self)
    }
}

impl ComponentCandidate for ComponentExport {
    fn name(&self) -> &str {
        self.registration.component_type()
    }

    fn resolve(&self, context: &DiscoveryContext<'_>) -> Result<Resolution, CallbackError> {
        for required in &self.requires {
            if let Some(dependency) = context.require_discovered(required) {
                debug!(
                    component = %self.component_type(),
                    requires = %required,
                    "Export waiting for dependency"
                );
                return Ok(Resolution::Defer(dependency));
            }
        }
        Ok(Resolution::Ready(self.registration.clone()))
    }
}

impl From<ComponentExport> for Arc<dyn ComponentCandidate> {
    fn from(export: ComponentExport) -> Self {
        export.into_candidate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_plugin::component::{CapabilityTable, Component, factory};
    use modhost_plugin::descriptor::Capability;

    struct Blank(CapabilityTable);

    impl Component for Blank {
        fn capabilities(&self) -> &CapabilityTable {
            &self.0
        }
    }

    fn blank_factory() -> ComponentFactory {
        factory(|_| Ok(Arc::new(Blank(CapabilityTable::new())) as Arc<dyn Component>))
    }

    #[test]
    fn test_from_structure_json() {
        let json = r#"{
            "module_desc": {"module_type": "lamp", "module_desc": "A dimmable lamp"},
            "module_properties": {
                "brightness": {"property_desc": "0-100", "permissions": "read_write", "data_type": "int"}
            },
            "module_methods": {}
        }"#;
        let export = ComponentExport::from_structure_json(json, blank_factory())
            .expect("parse")
            .map_descriptor(ComponentDescriptor::multi_instance)
            .requires("sensorbus");

        assert_eq!(export.component_type(), "lamp");
        assert!(export.descriptor().properties.contains_key("brightness"));
        assert_eq!(export.descriptor().capabilities, vec![Capability::MultiInstanceAllowed]);
        assert_eq!(export.requirements(), ["sensorbus".to_string()]);
    }

    #[test]
    fn test_bad_structure_json() {
        assert!(matches!(
            ComponentExport::from_structure_json("{", blank_factory()),
            Err(EngineError::InvalidStructure(_))
        ));
    }
}
