//! Hook table: system and custom hooks, attachments and firing.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{HookAction, HookArgument, HookAttachment, HookCallback, HookEvent, HookKind};
pub use dispatcher::{DispatchFailure, DispatchResult, HookActionExecutor, HookDispatcher};
pub use registry::HookTable;
