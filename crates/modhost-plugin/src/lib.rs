//! # modhost-plugin
//!
//! In-process component engine for modhost. Provides:
//!
//! - Component descriptors, structure documents and capability tables
//! - Component registry with instance naming and multi-instance policy
//! - Lifecycle controller (`ModuleManager`) with ownership-checked unload
//!   and cascading cleanup
//! - Hook table with load/unload actions and a dispatcher
//! - Custom method and interrupt side-registries
//! - Deferred activation for discovery candidates and external consumers
//! - A single mediated entry point for component requests
//! - A query surface returning tagged results

pub mod activation;
pub mod component;
pub mod deferral;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod instance;
pub mod macros;
pub mod manager;
pub mod mediator;
pub mod owner;
pub mod prelude;
pub mod query;
pub mod registries;
pub mod registry;

pub use component::{CapabilityTable, Component, ComponentContext, ComponentFactory};
pub use descriptor::{ComponentDescriptor, ComponentRegistration};
pub use error::{CallbackError, EngineError, EngineErrorKind, MethodError};
pub use hooks::definitions::{HookAction, HookArgument, HookEvent};
pub use manager::ModuleManager;
pub use mediator::{ManagerNotice, Mediator, MediatorReply, MediatorRequest, NoticeReason};
pub use owner::Owner;
pub use query::{QueryErrorCode, QueryResult};

pub use serde_json;
