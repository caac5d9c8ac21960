//! Hook attachments, actions and events.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use modhost_core::types::{AttachmentId, Kwargs};

use crate::error::CallbackError;
use crate::owner::Owner;

/// Which of the two hook tables a hook lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Fixed hooks installed at engine bootstrap, owned by the manager.
    System,
    /// Hooks installed at run time by instances or the manager.
    Custom,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// What the engine does when an attached callback returns `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookAction {
    /// Nothing beyond calling the callback.
    #[default]
    None,
    /// Load the component type named by the argument, forwarding the event
    /// kwargs as construction kwargs.
    LoadComponent,
    /// Unload the instance named by the argument.
    UnloadComponent,
}

/// Argument of an attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum HookArgument {
    #[default]
    None,
    /// A component type, for load actions.
    ComponentType(String),
    /// An instance name, for unload actions or to mark the attachment as
    /// referring to that instance.
    Instance(String),
}

impl HookArgument {
    /// Returns the instance name, if this argument names one.
    pub fn instance(&self) -> Option<&str> {
        match self {
            Self::Instance(name) => Some(name),
            _ => None,
        }
    }
}

/// A fired hook: its name, the event kwargs and when it fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    pub hook: String,
    pub kwargs: Kwargs,
    pub timestamp: DateTime<Utc>,
}

impl HookEvent {
    /// Creates an event stamped with the current time.
    pub fn new(hook: impl Into<String>, kwargs: Kwargs) -> Self {
        Self {
            hook: hook.into(),
            kwargs,
            timestamp: Utc::now(),
        }
    }

    /// Returns an event kwarg.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}

/// Callback invoked with each event. `Ok(true)` triggers the attachment's
/// action.
pub type HookCallback = Arc<dyn Fn(&HookEvent) -> Result<bool, CallbackError> + Send + Sync>;

/// Wraps a closure as a [`HookCallback`].
pub fn hook_callback<F>(f: F) -> HookCallback
where
    F: Fn(&HookEvent) -> Result<bool, CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One callback attached to a hook.
#[derive(Clone)]
pub struct HookAttachment {
    /// Handle used to detach.
    pub id: AttachmentId,
    pub callback: HookCallback,
    pub action: HookAction,
    pub argument: HookArgument,
    /// Who attached it; detached when that instance unloads.
    pub attached_by: Owner,
}

impl HookAttachment {
    /// Creates an attachment with no action.
    pub fn new(attached_by: Owner, callback: HookCallback) -> Self {
        Self {
            id: AttachmentId::new(),
            callback,
            action: HookAction::None,
            argument: HookArgument::None,
            attached_by,
        }
    }

    /// Sets action and argument.
    pub fn with_action(mut self, action: HookAction, argument: HookArgument) -> Self {
        self.action = action;
        self.argument = argument;
        self
    }

    /// Loads `component_type` when the callback returns `true`.
    pub fn load_on_true(self, component_type: impl Into<String>) -> Self {
        self.with_action(
            HookAction::LoadComponent,
            HookArgument::ComponentType(component_type.into()),
        )
    }

    /// Unloads `instance` when the callback returns `true`.
    pub fn unload_on_true(self, instance: impl Into<String>) -> Self {
        self.with_action(HookAction::UnloadComponent, HookArgument::Instance(instance.into()))
    }

    /// Marks the attachment as referring to `instance` without an action.
    pub fn referring_to(self, instance: impl Into<String>) -> Self {
        self.with_action(HookAction::None, HookArgument::Instance(instance.into()))
    }

    /// Returns whether the attachment is owned by or targets `instance`.
    pub fn references(&self, instance: &str) -> bool {
        self.attached_by.is_instance(instance) || self.argument.instance() == Some(instance)
    }
}

impl fmt::Debug for HookAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookAttachment")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("argument", &self.argument)
            .field("attached_by", &self.attached_by)
            .finish_non_exhaustive()
    }
}
