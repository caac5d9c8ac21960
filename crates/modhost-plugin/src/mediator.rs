//! The dispatch entry point instances use to request engine services.
//!
//! Each request is handled independently. A failing request does not
//! return an error: the failure is delivered to the caller's
//! [`Component::communicate`](crate::component::Component::communicate) as a
//! [`ManagerNotice`] and the request yields [`MediatorReply::Failed`]. The
//! one exception is `RequireInstance`, a precondition that fails the whole
//! call synchronously.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use modhost_core::types::{AttachmentId, Kwargs};

use crate::error::EngineError;
use crate::hooks::definitions::{HookAction, HookArgument, HookCallback};
use crate::manager::{EngineState, ModuleManager};
use crate::owner::Owner;
use crate::registries::{InterruptCallback, MethodCallback};

/// Why the engine is notifying an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeReason {
    CallMethodFailed,
    AttachHookFailed,
    LoadModuleFailed,
    UnloadModuleFailed,
    InstallHookFailed,
    InstallMethodFailed,
    InstallInterruptFailed,
    /// The instance owning a hook this instance was attached to unloaded.
    ProviderUnloaded,
}

impl NoticeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallMethodFailed => "call_method_failed",
            Self::AttachHookFailed => "attach_hook_failed",
            Self::LoadModuleFailed => "load_module_failed",
            Self::UnloadModuleFailed => "unload_module_failed",
            Self::InstallHookFailed => "install_hook_failed",
            Self::InstallMethodFailed => "install_method_failed",
            Self::InstallInterruptFailed => "install_interrupt_failed",
            Self::ProviderUnloaded => "provider_unloaded",
        }
    }
}

impl fmt::Display for NoticeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asynchronous message from the engine to an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerNotice {
    pub reason: NoticeReason,
    /// The failure, for request failures.
    pub error: Option<EngineError>,
    /// The hook concerned, for `ProviderUnloaded`.
    pub hook: Option<String>,
}

impl ManagerNotice {
    /// Notice for a failed request.
    pub fn failure(reason: NoticeReason, error: EngineError) -> Self {
        Self {
            reason,
            error: Some(error),
            hook: None,
        }
    }

    /// Notice that `hook` is gone because its owner unloaded.
    pub fn provider_unloaded(hook: impl Into<String>) -> Self {
        Self {
            reason: NoticeReason::ProviderUnloaded,
            error: None,
            hook: Some(hook.into()),
        }
    }
}

/// Log levels available to instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// A request routed through the entry point.
#[derive(Clone)]
pub enum MediatorRequest {
    /// List discovered component types.
    AvailableTypes,
    /// Emit a log record under the caller's name.
    Log { level: LogLevel, message: String },
    /// Call a custom method with positional arguments.
    CallCustomMethod { method: String, args: Vec<Value> },
    /// Attach to a custom hook.
    AttachCustomHook {
        hook: String,
        callback: HookCallback,
        action: HookAction,
        argument: HookArgument,
    },
    /// Attach to a system hook.
    AttachSystemHook {
        hook: String,
        callback: HookCallback,
        action: HookAction,
        argument: HookArgument,
    },
    /// Load a component, owned by the caller.
    LoadModule { component_type: String, kwargs: Kwargs },
    /// Unload an instance the caller owns.
    UnloadModule { instance: String },
    /// Install a custom hook owned by the caller.
    InstallCustomHook { name: String },
    /// Install a custom method owned by the caller.
    InstallCustomMethod { name: String, callback: MethodCallback },
    /// Install an interrupt handler owned by the caller.
    InstallInterrupt { name: String, callback: InterruptCallback },
    /// Fail the call unless the instance is loaded.
    RequireInstance { instance: String },
}

impl MediatorRequest {
    /// Short request name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AvailableTypes => "available_types",
            Self::Log { .. } => "log",
            Self::CallCustomMethod { .. } => "call_custom_method",
            Self::AttachCustomHook { .. } => "attach_custom_hook",
            Self::AttachSystemHook { .. } => "attach_system_hook",
            Self::LoadModule { .. } => "load_module",
            Self::UnloadModule { .. } => "unload_module",
            Self::InstallCustomHook { .. } => "install_custom_hook",
            Self::InstallCustomMethod { .. } => "install_custom_method",
            Self::InstallInterrupt { .. } => "install_interrupt",
            Self::RequireInstance { .. } => "require_instance",
        }
    }
}

impl fmt::Debug for MediatorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log { level, message } => f
                .debug_struct("Log")
                .field("level", level)
                .field("message", message)
                .finish(),
            Self::CallCustomMethod { method, args } => f
                .debug_struct("CallCustomMethod")
                .field("method", method)
                .field("args", args)
                .finish(),
            Self::LoadModule { component_type, kwargs } => f
                .debug_struct("LoadModule")
                .field("component_type", component_type)
                .field("kwargs", kwargs)
                .finish(),
            Self::UnloadModule { instance } | Self::RequireInstance { instance } => {
                write!(f, "{}({instance})", self.name())
            }
            Self::AttachCustomHook { hook, .. } | Self::AttachSystemHook { hook, .. } => {
                write!(f, "{}({hook})", self.name())
            }
            Self::InstallCustomHook { name }
            | Self::InstallCustomMethod { name, .. }
            | Self::InstallInterrupt { name, .. } => write!(f, "{}({name})", self.name()),
            Self::AvailableTypes => f.write_str(self.name()),
        }
    }
}

/// Per-request reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MediatorReply {
    Done,
    Types(Vec<String>),
    Value(Value),
    Attached(AttachmentId),
    Loaded(String),
    /// The request failed; the caller was notified.
    Failed(NoticeReason),
}

/// Per-instance handle on the engine, handed to the factory.
///
/// Holds a weak reference: an instance never keeps the engine alive.
#[derive(Clone)]
pub struct Mediator {
    engine: Weak<EngineState>,
    instance: String,
}

impl Mediator {
    pub(crate) fn new(engine: &Arc<EngineState>, instance: &str) -> Self {
        Self {
            engine: Arc::downgrade(engine),
            instance: instance.to_string(),
        }
    }

    /// A mediator not connected to any engine. Every request fails with
    /// `NotLoaded`.
    pub fn detached(instance: &str) -> Self {
        Self {
            engine: Weak::new(),
            instance: instance.to_string(),
        }
    }

    /// Name of the instance this mediator speaks for.
    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    /// The engine, while it is alive.
    pub fn manager(&self) -> Result<ModuleManager, EngineError> {
        self.engine
            .upgrade()
            .map(ModuleManager::from_state)
            .ok_or_else(|| EngineError::NotLoaded(self.instance.clone()))
    }

    /// Routes requests through [`ModuleManager::mediate`] as this instance.
    pub fn mediate(&self, requests: Vec<MediatorRequest>) -> Result<Vec<MediatorReply>, EngineError> {
        self.manager()?
            .mediate(&Owner::instance(self.instance.clone()), requests)
    }

    fn single(&self, request: MediatorRequest) -> Result<MediatorReply, EngineError> {
        Ok(self
            .mediate(vec![request])?
            .pop()
            .unwrap_or(MediatorReply::Done))
    }

    /// Discovered component types.
    pub fn available_types(&self) -> Vec<String> {
        match self.single(MediatorRequest::AvailableTypes) {
            Ok(MediatorReply::Types(types)) => types,
            _ => Vec::new(),
        }
    }

    /// Returns whether the engine took the record.
    fn log(&self, level: LogLevel, message: impl Into<String>) -> bool {
        match self.single(MediatorRequest::Log {
            level,
            message: message.into(),
        }) {
            Ok(_) => true,
            Err(e) => {
                debug!(instance = %self.instance, error = %e, "Log record dropped");
                false
            }
        }
    }

    pub fn log_info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Calls a custom method. `None` when the call failed.
    pub fn call_custom_method(&self, method: &str, args: Vec<Value>) -> Option<Value> {
        match self.single(MediatorRequest::CallCustomMethod {
            method: method.to_string(),
            args,
        }) {
            Ok(MediatorReply::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Attaches to a custom hook. `None` when the hook does not exist.
    pub fn attach_custom_hook(
        &self,
        hook: &str,
        callback: HookCallback,
        action: HookAction,
        argument: HookArgument,
    ) -> Option<AttachmentId> {
        match self.single(MediatorRequest::AttachCustomHook {
            hook: hook.to_string(),
            callback,
            action,
            argument,
        }) {
            Ok(MediatorReply::Attached(id)) => Some(id),
            _ => None,
        }
    }

    /// Attaches to a system hook. `None` when the hook does not exist.
    pub fn attach_system_hook(
        &self,
        hook: &str,
        callback: HookCallback,
        action: HookAction,
        argument: HookArgument,
    ) -> Option<AttachmentId> {
        match self.single(MediatorRequest::AttachSystemHook {
            hook: hook.to_string(),
            callback,
            action,
            argument,
        }) {
            Ok(MediatorReply::Attached(id)) => Some(id),
            _ => None,
        }
    }

    /// Loads a component owned by this instance.
    pub fn load_module(&self, component_type: &str, kwargs: Kwargs) -> Option<String> {
        match self.single(MediatorRequest::LoadModule {
            component_type: component_type.to_string(),
            kwargs,
        }) {
            Ok(MediatorReply::Loaded(name)) => Some(name),
            _ => None,
        }
    }

    /// Unloads an instance this instance owns.
    pub fn unload_module(&self, instance: &str) -> bool {
        matches!(
            self.single(MediatorRequest::UnloadModule {
                instance: instance.to_string()
            }),
            Ok(MediatorReply::Done)
        )
    }

    pub fn install_custom_hook(&self, name: &str) -> bool {
        matches!(
            self.single(MediatorRequest::InstallCustomHook {
                name: name.to_string()
            }),
            Ok(MediatorReply::Done)
        )
    }

    pub fn install_custom_method(&self, name: &str, callback: MethodCallback) -> bool {
        matches!(
            self.single(MediatorRequest::InstallCustomMethod {
                name: name.to_string(),
                callback,
            }),
            Ok(MediatorReply::Done)
        )
    }

    pub fn install_interrupt(&self, name: &str, callback: InterruptCallback) -> bool {
        matches!(
            self.single(MediatorRequest::InstallInterrupt {
                name: name.to_string(),
                callback,
            }),
            Ok(MediatorReply::Done)
        )
    }

    /// Fails unless `instance` is loaded.
    pub fn require_instance(&self, instance: &str) -> Result<(), EngineError> {
        self.single(MediatorRequest::RequireInstance {
            instance: instance.to_string(),
        })
        .map(|_| ())
    }

    /// Fires a custom hook. Not a mediated request: errors return directly.
    pub fn fire_custom_hook(&self, hook: &str, kwargs: Kwargs) -> Result<(), EngineError> {
        self.manager()?.fire_custom_hook(hook, kwargs).map(|_| ())
    }
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("instance", &self.instance)
            .field("connected", &(self.engine.strong_count() > 0))
            .finish()
    }
}
