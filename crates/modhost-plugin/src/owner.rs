//! Ownership keys recorded for instances, hooks, methods and interrupts.

use std::fmt;

use serde::{Deserialize, Serialize};

use modhost_core::events::MANAGER_OWNER;

/// Who installed or loaded something.
///
/// Only the recorded owner or the manager may unload an instance, and an
/// unload removes everything the instance owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Owner {
    /// The engine itself.
    Manager,
    /// A loaded instance, by name.
    Instance(String),
}

impl Owner {
    /// Creates an owner for an instance name.
    pub fn instance(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// Returns the string form recorded in `loaded_by`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Manager => MANAGER_OWNER,
            Self::Instance(name) => name,
        }
    }

    /// Returns whether this is the manager sentinel.
    pub fn is_manager(&self) -> bool {
        matches!(self, Self::Manager)
    }

    /// Returns whether this owner is the named instance.
    pub fn is_instance(&self, name: &str) -> bool {
        matches!(self, Self::Instance(n) if n == name)
    }
}

impl From<String> for Owner {
    fn from(value: String) -> Self {
        if value == MANAGER_OWNER {
            Self::Manager
        } else {
            Self::Instance(value)
        }
    }
}

impl From<&str> for Owner {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Owner> for String {
    fn from(value: Owner) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
