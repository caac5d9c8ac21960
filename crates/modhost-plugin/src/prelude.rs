//! Prelude for convenient imports.

pub use modhost_core::types::{AttachmentId, Kwargs, KwargsExt};

pub use crate::activation::{Activation, ActivationConsumer, ActivationOutcome};
pub use crate::component::{CapabilityTable, Component, ComponentContext, ComponentFactory, factory};
pub use crate::deferral::Dependency;
pub use crate::descriptor::{
    Capability, ComponentDescriptor, ComponentRegistration, DataType, MethodDescriptor, Permission,
    PropertyDescriptor,
};
pub use crate::discovery::{ComponentCandidate, DiscoveryContext, DiscoveryReport, DiscoverySource, Resolution, StaticSource};
pub use crate::error::{CallbackError, EngineError, MethodError};
pub use crate::hooks::definitions::{HookAction, HookArgument, HookAttachment, HookEvent, HookKind, hook_callback};
pub use crate::hooks::dispatcher::DispatchResult;
pub use crate::manager::ModuleManager;
pub use crate::mediator::{LogLevel, ManagerNotice, Mediator, MediatorReply, MediatorRequest, NoticeReason};
pub use crate::owner::Owner;
pub use crate::query::{QueryErrorCode, QueryResult};
pub use crate::registries::interrupts::interrupt_callback;
pub use crate::registries::methods::method_callback;

pub use crate::{attachment, kwargs};
