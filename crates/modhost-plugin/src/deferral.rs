//! Deferred activations keyed by the dependency they wait for.
//!
//! An entry is satisfied by a load of `component_type` when it names no
//! instance, or when the loaded instance is `<component_type>-<instance>`
//! or exactly `<instance>`. Satisfied entries are removed and handed back
//! once; retrying may defer them again under a new key.

use std::fmt;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use modhost_core::types::DeferralId;

/// What a deferred activation waits for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    /// Required component type.
    pub component_type: String,
    /// Required instance suffix or name. Empty means any instance.
    #[serde(default)]
    pub instance: String,
}

impl Dependency {
    /// Any instance of a type.
    pub fn any(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            instance: String::new(),
        }
    }

    /// A specific instance of a type.
    pub fn instance(component_type: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            instance: instance.into(),
        }
    }

    /// Returns whether loading `loaded_instance` of `loaded_type` satisfies
    /// this dependency.
    pub fn is_satisfied_by(&self, loaded_type: &str, loaded_instance: &str) -> bool {
        if self.component_type != loaded_type {
            return false;
        }
        if self.instance.is_empty() || loaded_instance == self.instance {
            return true;
        }
        loaded_instance
            .strip_prefix(loaded_type)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|suffix| suffix == self.instance)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance.is_empty() {
            write!(f, "{}", self.component_type)
        } else {
            write!(f, "{}[{}]", self.component_type, self.instance)
        }
    }
}

/// A pending activation and its retry token.
#[derive(Debug, Clone)]
pub struct DeferredEntry<T> {
    pub id: DeferralId,
    pub dependency: Dependency,
    pub token: T,
}

/// Pending activations grouped by required type.
#[derive(Debug)]
pub struct DeferralTable<T> {
    entries: Mutex<IndexMap<String, Vec<DeferredEntry<T>>>>,
}

impl<T: Clone> DeferralTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Stores an entry.
    pub fn defer(&self, dependency: Dependency, token: T) -> DeferralId {
        let id = DeferralId::new();
        self.entries
            .lock()
            .entry(dependency.component_type.clone())
            .or_default()
            .push(DeferredEntry {
                id,
                dependency,
                token,
            });
        id
    }

    /// Removes and returns the entries a load satisfies, in deferral order.
    pub fn take_satisfied(&self, loaded_type: &str, loaded_instance: &str) -> Vec<DeferredEntry<T>> {
        let mut entries = self.entries.lock();
        let Some(waiting) = entries.get_mut(loaded_type) else {
            return Vec::new();
        };

        let (ready, rest): (Vec<_>, Vec<_>) = waiting
            .drain(..)
            .partition(|e| e.dependency.is_satisfied_by(loaded_type, loaded_instance));
        *waiting = rest;
        if waiting.is_empty() {
            entries.shift_remove(loaded_type);
        }
        ready
    }

    /// All pending entries.
    pub fn pending(&self) -> Vec<DeferredEntry<T>> {
        self.entries.lock().values().flatten().cloned().collect()
    }

    /// Removes one entry by id.
    pub fn cancel(&self, id: DeferralId) -> bool {
        let mut entries = self.entries.lock();
        let Some((key, pos)) = entries.iter().find_map(|(key, waiting)| {
            waiting
                .iter()
                .position(|e| e.id == id)
                .map(|pos| (key.clone(), pos))
        }) else {
            return false;
        };
        if let Some(waiting) = entries.get_mut(&key) {
            waiting.remove(pos);
            if waiting.is_empty() {
                entries.shift_remove(&key);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for DeferralTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
