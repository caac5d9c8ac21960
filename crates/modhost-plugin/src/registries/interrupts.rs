//! External interrupts: fire-and-forget handlers keyed by name.

use std::sync::Arc;

use tracing::{debug, info, warn};

use modhost_core::types::Kwargs;

use super::CallableTable;
use crate::error::{CallbackError, EngineError};
use crate::owner::Owner;

/// An interrupt handler.
pub type InterruptCallback = Arc<dyn Fn(&Kwargs) -> Result<(), CallbackError> + Send + Sync>;

/// Wraps a closure as an [`InterruptCallback`].
pub fn interrupt_callback<F>(f: F) -> InterruptCallback
where
    F: Fn(&Kwargs) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Interrupt handler table.
#[derive(Debug)]
pub struct InterruptTable {
    inner: CallableTable<dyn Fn(&Kwargs) -> Result<(), CallbackError> + Send + Sync>,
}

impl InterruptTable {
    pub fn new() -> Self {
        Self {
            inner: CallableTable::new(),
        }
    }

    /// Installs a handler under a free name.
    pub fn install(&self, name: &str, callback: InterruptCallback, owner: Owner) -> Result<(), EngineError> {
        if !self.inner.install(name, callback, owner.clone()) {
            return Err(EngineError::InterruptAlreadyInstalled(name.to_string()));
        }
        debug!(interrupt = %name, owner = %owner, "Interrupt handler installed");
        Ok(())
    }

    /// Runs a handler. A handler failure is logged, not returned.
    pub fn raise(&self, name: &str, kwargs: &Kwargs) -> Result<(), EngineError> {
        let callback = self
            .inner
            .get(name)
            .ok_or_else(|| EngineError::InterruptNotAvailable(name.to_string()))?;
        if let Err(e) = callback(kwargs) {
            warn!(interrupt = %name, error = %e, "Interrupt handler failed");
        }
        Ok(())
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
            info!(instance = %instance, interrupts = ?removed, "Interrupt handlers removed");
        }
        removed
    }
}

impl Default for InterruptTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_raise_runs_handler() {
        let table = InterruptTable::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        table
            .install(
                "irq",
                interrupt_callback(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                Owner::instance("bus"),
            )
            .expect("install");

        table.raise("irq", &Kwargs::new()).expect("raise");
        table.raise("irq", &Kwargs::new()).expect("raise");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_failure_is_swallowed() {
        let table = InterruptTable::new();
        table
            .install("irq", interrupt_callback(|_| Err("line stuck".into())), Owner::Manager)
            .expect("install");
        assert!(table.raise("irq", &Kwargs::new()).is_ok());
    }

    #[test]
    fn test_duplicate_and_missing() {
        let table = InterruptTable::new();
        let cb = interrupt_callback(|_| Ok(()));
        table.install("irq", cb.clone(), Owner::Manager).expect("install");
        assert!(matches!(
            table.install("irq", cb, Owner::Manager),
            Err(EngineError::InterruptAlreadyInstalled(_))
        ));
        assert!(matches!(
            table.raise("nmi", &Kwargs::new()),
            Err(EngineError::InterruptNotAvailable(_))
        ));
    }
}
