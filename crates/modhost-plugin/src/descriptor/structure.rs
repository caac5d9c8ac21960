//! Structure documents: the serialized form of a descriptor's identity,
//! property table and method table.
//!
//! ```json
//! {
//!   "module_desc": { "module_type": "sensornode", "module_desc": "..." },
//!   "module_properties": {
//!     "uid": { "property_desc": "...", "permissions": "read", "data_type": "int" }
//!   },
//!   "module_methods": {
//!     "read_object": {
//!       "method_desc": "...",
//!       "method_args": { "index": { "arg_desc": "...", "arg_required": true, "arg_dtype": "int" } },
//!       "method_return": "dict"
//!     }
//!   }
//! }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{ComponentDescriptor, DataType, MethodArgument, MethodDescriptor, Permission, PropertyDescriptor};
use crate::error::EngineError;

/// Type name and description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module_type: String,
    pub module_desc: String,
}

/// Serialized property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyStructure {
    pub property_desc: String,
    #[serde(default)]
    pub permissions: Permission,
    #[serde(default)]
    pub data_type: DataType,
}

/// Serialized method argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodArgStructure {
    pub arg_desc: String,
    #[serde(default)]
    pub arg_required: bool,
    #[serde(default)]
    pub arg_dtype: DataType,
}

/// Serialized method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodStructure {
    pub method_desc: String,
    #[serde(default)]
    pub method_args: IndexMap<String, MethodArgStructure>,
    #[serde(default)]
    pub method_return: DataType,
}

/// A complete structure document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStructure {
    pub module_desc: ModuleInfo,
    #[serde(default)]
    pub module_properties: IndexMap<String, PropertyStructure>,
    #[serde(default)]
    pub module_methods: IndexMap<String, MethodStructure>,
}

impl ModuleStructure {
    /// Parses a structure document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text).map_err(|e| EngineError::InvalidStructure(e.to_string()))
    }

    /// Reads a structure document from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::InvalidStructure(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

impl From<&PropertyDescriptor> for PropertyStructure {
    fn from(prop: &PropertyDescriptor) -> Self {
        Self {
            property_desc: prop.description.clone(),
            permissions: prop.permission,
            data_type: prop.data_type,
        }
    }
}

impl From<&MethodDescriptor> for MethodStructure {
    fn from(method: &MethodDescriptor) -> Self {
        Self {
            method_desc: method.description.clone(),
            method_args: method
                .args
                .iter()
                .map(|(name, arg)| {
                    (
                        name.clone(),
                        MethodArgStructure {
                            arg_desc: arg.description.clone(),
                            arg_required: arg.required,
                            arg_dtype: arg.data_type,
                        },
                    )
                })
                .collect(),
            method_return: method.returns,
        }
    }
}

impl ComponentDescriptor {
    /// Builds a descriptor from a structure document. Construction
    /// arguments, capabilities and the collision suffix are not part of the
    /// document and start empty.
    pub fn from_structure(structure: &ModuleStructure) -> Self {
        let mut descriptor = Self::new(
            structure.module_desc.module_type.clone(),
            structure.module_desc.module_desc.clone(),
        );
        descriptor.hydrate(structure);
        descriptor
    }

    /// Replaces the property and method tables with those of `structure`.
    pub fn hydrate(&mut self, structure: &ModuleStructure) {
        self.properties = structure
            .module_properties
            .iter()
            .map(|(name, prop)| {
                (
                    name.clone(),
                    PropertyDescriptor::new(prop.property_desc.clone(), prop.permissions, prop.data_type),
                )
            })
            .collect();

        self.methods = structure
            .module_methods
            .iter()
            .map(|(name, method)| {
                let args = method
                    .method_args
                    .iter()
                    .map(|(arg_name, arg)| {
                        (
                            arg_name.clone(),
                            MethodArgument {
                                description: arg.arg_desc.clone(),
                                required: arg.arg_required,
                                data_type: arg.arg_dtype,
                            },
                        )
                    })
                    .collect();
                (
                    name.clone(),
                    MethodDescriptor {
                        description: method.method_desc.clone(),
                        args,
                        returns: method.method_return,
                    },
                )
            })
            .collect();
    }

    /// Serialized property table.
    pub fn property_structures(&self) -> IndexMap<String, PropertyStructure> {
        self.properties
            .iter()
            .map(|(name, prop)| (name.clone(), PropertyStructure::from(prop)))
            .collect()
    }

    /// Serialized method table.
    pub fn method_structures(&self) -> IndexMap<String, MethodStructure> {
        self.methods
            .iter()
            .map(|(name, method)| (name.clone(), MethodStructure::from(method)))
            .collect()
    }

    /// Dumps the descriptor as a structure document.
    pub fn structure(&self) -> ModuleStructure {
        ModuleStructure {
            module_desc: self.info(),
            module_properties: self.property_structures(),
            module_methods: self.method_structures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"{
        "module_desc": { "module_type": "lamp", "module_desc": "dimmable lamp" },
        "module_properties": {
            "level": { "property_desc": "brightness", "permissions": "read_write", "data_type": "int" },
            "serial": { "property_desc": "serial number", "permissions": "read", "data_type": "string" }
        },
        "module_methods": {
            "fade": {
                "method_desc": "fade to level",
                "method_args": {
                    "target": { "arg_desc": "target level", "arg_required": true, "arg_dtype": "int" }
                },
                "method_return": "void"
            }
        }
    }"#;

    #[test]
    fn test_hydrates_tables() {
        let structure = ModuleStructure::from_json_str(DOC).expect("parse");
        let descriptor = ComponentDescriptor::from_structure(&structure);

        assert_eq!(descriptor.component_type, "lamp");
        assert_eq!(descriptor.properties["serial"].permission, Permission::Read);
        assert_eq!(descriptor.properties["level"].data_type, DataType::Int);
        assert!(descriptor.methods["fade"].args["target"].required);
        assert_eq!(
            descriptor.properties.keys().collect::<Vec<_>>(),
            vec!["level", "serial"]
        );
    }

    #[test]
    fn test_dump_matches_document() {
        let structure = ModuleStructure::from_json_str(DOC).expect("parse");
        let descriptor = ComponentDescriptor::from_structure(&structure);
        assert_eq!(descriptor.structure(), structure);
    }

    #[test]
    fn test_invalid_document() {
        let err = ModuleStructure::from_json_str(r#"{"module_properties": {}}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStructure(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(DOC.as_bytes()).expect("write");

        let structure = ModuleStructure::from_file(file.path()).expect("read");
        assert_eq!(structure.module_desc.module_type, "lamp");

        let missing = ModuleStructure::from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(EngineError::InvalidStructure(_))));
    }
}
