//! Error types for the component engine.
//!
//! `EngineError` covers true failures. Waiting for a dependency is not an
//! error and is expressed through `Resolution::Defer` and
//! `Activation::Defer` instead.

use modhost_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::Permission;

/// Failure reported by component code: factories, hook callbacks, custom
/// methods, interrupts and discovery candidates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CallbackError(String);

impl CallbackError {
    /// Creates a callback error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for CallbackError {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CallbackError {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<EngineError> for CallbackError {
    fn from(value: EngineError) -> Self {
        Self(value.to_string())
    }
}

impl From<serde_json::Error> for CallbackError {
    fn from(value: serde_json::Error) -> Self {
        Self(value.to_string())
    }
}

/// Failures of a by-name method call on an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    /// The method is not declared by the component type.
    #[error("method '{method}' does not exist")]
    Unknown {
        /// Requested method name.
        method: String,
    },

    /// A required argument was omitted.
    #[error("method '{method}' is missing required argument '{argument}'")]
    MissingArgument {
        /// Method name.
        method: String,
        /// Missing argument name.
        argument: String,
    },

    /// An argument not declared for the method was passed.
    #[error("method '{method}' does not accept argument '{argument}'")]
    UnexpectedArgument {
        /// Method name.
        method: String,
        /// Offending argument name.
        argument: String,
    },

    /// The underlying call failed.
    #[error("method '{method}' failed: {message}")]
    Failed {
        /// Method name.
        method: String,
        /// Failure message reported by the component.
        message: String,
    },
}

/// Engine failure taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The component type has not been discovered.
    #[error("unknown component type '{0}'")]
    UnknownComponent(String),

    /// A required construction argument was not supplied.
    #[error("component '{component_type}' requires argument '{argument}'")]
    MissingArgument {
        /// Component type being loaded.
        component_type: String,
        /// Missing argument.
        argument: String,
    },

    /// The component factory returned an error.
    #[error("component '{component_type}' failed to initialize: {message}")]
    ComponentFailed {
        /// Component type being loaded.
        component_type: String,
        /// Factory error message.
        message: String,
    },

    /// The name is taken, or the type is single-instance and already loaded.
    #[error("'{0}' is already loaded")]
    AlreadyLoaded(String),

    /// The instance is not loaded.
    #[error("instance '{0}' is not loaded")]
    NotLoaded(String),

    /// The requester is neither the owner nor the manager.
    #[error("'{requester}' is not allowed to unload '{instance}'")]
    Forbidden {
        /// Target instance.
        instance: String,
        /// Requesting owner.
        requester: String,
    },

    /// The component does not declare the property.
    #[error("instance '{instance}' has no property '{property}'")]
    InvalidProperty {
        /// Instance name.
        instance: String,
        /// Property name.
        property: String,
    },

    /// Read of a write-only property or write of a read-only property.
    #[error("property '{property}' of '{instance}' is {permission}")]
    PropertyPermission {
        /// Instance name.
        instance: String,
        /// Property name.
        property: String,
        /// Declared permission of the property.
        permission: Permission,
    },

    /// A method call was rejected or failed.
    #[error(transparent)]
    Method(#[from] MethodError),

    /// No hook is installed under this name.
    #[error("hook '{0}' is not available")]
    HookNotAvailable(String),

    /// A custom hook with this name already exists.
    #[error("hook '{0}' is already installed")]
    HookAlreadyInstalled(String),

    /// No custom method is installed under this name.
    #[error("custom method '{0}' is not available")]
    MethodNotAvailable(String),

    /// A custom method with this name already exists.
    #[error("custom method '{0}' is already installed")]
    MethodAlreadyInstalled(String),

    /// No interrupt handler is installed under this name.
    #[error("interrupt '{0}' is not available")]
    InterruptNotAvailable(String),

    /// An interrupt handler with this name already exists.
    #[error("interrupt '{0}' is already installed")]
    InterruptAlreadyInstalled(String),

    /// A multi-instance type was required without naming an instance.
    #[error("component '{0}' allows multiple instances, an instance name is required")]
    InstanceRequired(String),

    /// Nested deferred replays exceeded the configured ceiling.
    #[error("deferred replay depth limit of {depth} exceeded")]
    ReplayLimitExceeded {
        /// Configured ceiling.
        depth: usize,
    },

    /// A structure document could not be decoded.
    #[error("invalid structure document: {0}")]
    InvalidStructure(String),

    /// A callback, custom method or interrupt reported a failure.
    #[error("callback failed: {0}")]
    Callback(#[from] CallbackError),
}

/// Kind names of [`EngineError`], used in notices and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    /// Unknown type, missing argument, or failed factory.
    LoadError,
    /// Name or singleton collision.
    AlreadyLoaded,
    /// Operation on an absent instance.
    NotLoaded,
    /// Unload requested by a non-owner.
    Forbidden,
    /// Unknown property.
    InvalidProperty,
    /// Permission violation on a property.
    PropertyPermission,
    /// Method call rejected or failed.
    MethodError,
    /// Unknown hook.
    HookNotAvailable,
    /// Duplicate custom hook.
    HookAlreadyInstalled,
    /// Unknown custom method.
    MethodNotAvailable,
    /// Duplicate custom method.
    MethodAlreadyInstalled,
    /// Unknown interrupt.
    InterruptNotAvailable,
    /// Duplicate interrupt.
    InterruptAlreadyInstalled,
    /// Ambiguous instance requirement.
    InstanceRequired,
    /// Replay ceiling hit.
    ReplayLimitExceeded,
    /// Undecodable structure document.
    InvalidStructure,
    /// Component code failure.
    CallbackFailed,
}

impl EngineError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            Self::UnknownComponent(_)
            | Self::MissingArgument { .. }
            | Self::ComponentFailed { .. } => EngineErrorKind::LoadError,
            Self::AlreadyLoaded(_) => EngineErrorKind::AlreadyLoaded,
            Self::NotLoaded(_) => EngineErrorKind::NotLoaded,
            Self::Forbidden { .. } => EngineErrorKind::Forbidden,
            Self::InvalidProperty { .. } => EngineErrorKind::InvalidProperty,
            Self::PropertyPermission { .. } => EngineErrorKind::PropertyPermission,
            Self::Method(_) => EngineErrorKind::MethodError,
            Self::HookNotAvailable(_) => EngineErrorKind::HookNotAvailable,
            Self::HookAlreadyInstalled(_) => EngineErrorKind::HookAlreadyInstalled,
            Self::MethodNotAvailable(_) => EngineErrorKind::MethodNotAvailable,
            Self::MethodAlreadyInstalled(_) => EngineErrorKind::MethodAlreadyInstalled,
            Self::InterruptNotAvailable(_) => EngineErrorKind::InterruptNotAvailable,
            Self::InterruptAlreadyInstalled(_) => EngineErrorKind::InterruptAlreadyInstalled,
            Self::InstanceRequired(_) => EngineErrorKind::InstanceRequired,
            Self::ReplayLimitExceeded { .. } => EngineErrorKind::ReplayLimitExceeded,
            Self::InvalidStructure(_) => EngineErrorKind::InvalidStructure,
            Self::Callback(_) => EngineErrorKind::CallbackFailed,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let kind = match err.kind() {
            EngineErrorKind::LoadError => match &err {
                EngineError::UnknownComponent(_) => ErrorKind::NotFound,
                EngineError::MissingArgument { .. } => ErrorKind::Validation,
                _ => ErrorKind::Component,
            },
            EngineErrorKind::AlreadyLoaded
            | EngineErrorKind::HookAlreadyInstalled
            | EngineErrorKind::MethodAlreadyInstalled
            | EngineErrorKind::InterruptAlreadyInstalled => ErrorKind::Conflict,
            EngineErrorKind::NotLoaded
            | EngineErrorKind::InvalidProperty
            | EngineErrorKind::HookNotAvailable
            | EngineErrorKind::MethodNotAvailable
            | EngineErrorKind::InterruptNotAvailable => ErrorKind::NotFound,
            EngineErrorKind::Forbidden | EngineErrorKind::PropertyPermission => {
                ErrorKind::Authorization
            }
            EngineErrorKind::MethodError | EngineErrorKind::InstanceRequired => {
                ErrorKind::Validation
            }
            EngineErrorKind::CallbackFailed => ErrorKind::Component,
            EngineErrorKind::InvalidStructure => ErrorKind::Serialization,
            EngineErrorKind::ReplayLimitExceeded => ErrorKind::Internal,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}
