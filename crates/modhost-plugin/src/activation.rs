//! External activation consumers: anything that needs a loaded instance
//! before it can start, such as a script or a rule set.
//!
//! A consumer is activated through [`ModuleManager::submit_activation`]. If
//! it returns [`Activation::Defer`], it is stored and retried once a
//! matching instance loads.

use serde::Serialize;

use crate::deferral::Dependency;
use crate::error::CallbackError;
use crate::manager::ModuleManager;

/// What an activation attempt decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The consumer is active.
    Ready,
    /// Retry once the dependency is loaded.
    Defer(Dependency),
    /// Give up for good.
    Cancel(String),
}

/// A consumer that can be activated and retried.
pub trait ActivationConsumer: Send + Sync {
    fn name(&self) -> &str;

    /// Attempts activation. Called again after each matching load while
    /// deferred.
    fn activate(&self, manager: &ModuleManager) -> Result<Activation, CallbackError>;
}

/// Outcome reported to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ActivationOutcome {
    Activated,
    Deferred(Dependency),
    Cancelled(String),
    Failed(String),
}

impl ActivationOutcome {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}
