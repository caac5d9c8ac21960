//! Custom methods: named callables other instances can invoke.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use modhost_core::types::Kwargs;

use super::CallableTable;
use crate::error::{CallbackError, EngineError};
use crate::owner::Owner;

/// A custom method. Receives positional and keyword arguments.
pub type MethodCallback = Arc<dyn Fn(&[Value], &Kwargs) -> Result<Value, CallbackError> + Send + Sync>;

/// Wraps a closure as a [`MethodCallback`].
pub fn method_callback<F>(f: F) -> MethodCallback
where
    F: Fn(&[Value], &Kwargs) -> Result<Value, CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Custom method table.
#[derive(Debug)]
pub struct MethodTable {
    inner: CallableTable<dyn Fn(&[Value], &Kwargs) -> Result<Value, CallbackError> + Send + Sync>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self {
            inner: CallableTable::new(),
        }
    }

    /// Installs a method under a free name.
    pub fn install(&self, name: &str, callback: MethodCallback, owner: Owner) -> Result<(), EngineError> {
        if !self.inner.install(name, callback, owner.clone()) {
            return Err(EngineError::MethodAlreadyInstalled(name.to_string()));
        }
        debug!(method = %name, owner = %owner, "Custom method installed");
        Ok(())
    }

    /// Invokes a method and returns its result.
    pub fn call(&self, name: &str, args: &[Value], kwargs: &Kwargs) -> Result<Value, EngineError> {
        let callback = self
            .inner
            .get(name)
            .ok_or_else(|| EngineError::MethodNotAvailable(name.to_string()))?;
        Ok(callback(args, kwargs)?)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    pub fn owner(&self, name: &str) -> Option<Owner> {
        self.inner.owner(name)
    }

    pub(crate) fn remove_owned_by(&self, instance: &str) -> Vec<String> {
        let removed = self.inner.remove_owned_by(instance);
        if !removed.is_empty() {
            info!(instance = %instance, methods = ?removed, "Custom methods removed");
        }
        removed
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::new()
    }
}
