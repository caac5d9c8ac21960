//! Name-indexed side-registries for custom methods and external interrupts.
//!
//! Entries are removed by owner only as part of an instance unload.

pub mod interrupts;
pub mod methods;

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::owner::Owner;

pub use interrupts::{InterruptCallback, InterruptTable};
pub use methods::{MethodCallback, MethodTable};

/// An installed callable and its owner.
struct Entry<F: ?Sized> {
    callback: Arc<F>,
    owner: Owner,
}

/// Shared storage for both side-registries.
pub(crate) struct CallableTable<F: ?Sized> {
    entries: RwLock<IndexMap<String, Entry<F>>>,
}

impl<F: ?Sized> CallableTable<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Returns `false` without replacing when the name is taken.
    pub(crate) fn install(&self, name: &str, callback: Arc<F>, owner: Owner) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), Entry { callback, owner });
        true
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<F>> {
        self.entries.read().get(name).map(|e| e.callback.clone())
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub(crate) fn owner(&self, name: &str) -> Option<Owner> {
        self.entries.read().get(name).map(|e| e.owner.clone())
    }

    /// Removes every entry owned by `instance`, returning the names.
    pub(crate) fn remove_owned_by(&self, instance: &str) -> Vec<String> {
        let mut entries = self.entries.write();
        let owned: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.owner.is_instance(instance))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &owned {
            entries.shift_remove(name);
        }
        owned
    }
}

impl<F: ?Sized> std::fmt::Debug for CallableTable<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.read().keys()).finish()
    }
}
