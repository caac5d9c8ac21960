//! Hook dispatcher: fires a hook's attachments in attachment order and
//! carries out the load/unload actions of callbacks that return `true`.
//!
//! - A failing callback is logged and the remaining attachments still fire.
//! - An attachment detached by an earlier callback of the same firing is
//!   skipped.
//! - If the hook itself is removed mid-firing, firing stops.

use std::sync::Arc;

use tracing::{debug, warn};

use modhost_core::types::{AttachmentId, Kwargs};

use super::definitions::{HookAction, HookArgument, HookEvent, HookKind};
use super::registry::HookTable;
use crate::error::EngineError;
use crate::owner::Owner;

/// Performs the actions hooks trigger. Implemented by the manager; both
/// requests are issued as the manager.
pub trait HookActionExecutor {
    /// Loads a component type with the event kwargs.
    fn load_component(&self, component_type: &str, kwargs: Kwargs) -> Result<String, EngineError>;

    /// Unloads an instance.
    fn unload_component(&self, instance: &str) -> Result<(), EngineError>;
}

/// An attachment whose callback or action failed.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub attachment: AttachmentId,
    pub attached_by: Owner,
    pub error: EngineError,
}

/// Summary of one firing.
#[derive(Debug, Clone, Default)]
pub struct DispatchResult {
    /// Callbacks invoked.
    pub fired: usize,
    /// Instances loaded by `LoadComponent` actions.
    pub loaded: Vec<String>,
    /// Instances unloaded by `UnloadComponent` actions.
    pub unloaded: Vec<String>,
    /// Per-attachment failures.
    pub failures: Vec<DispatchFailure>,
}

impl DispatchResult {
    /// Returns whether every callback and action succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fires hooks from a [`HookTable`].
#[derive(Debug)]
pub struct HookDispatcher {
    table: Arc<HookTable>,
}

impl HookDispatcher {
    /// Creates a dispatcher over a hook table.
    pub fn new(table: Arc<HookTable>) -> Self {
        Self { table }
    }

    /// Fires `event.hook` from the `kind` table.
    pub fn fire(
        &self,
        kind: HookKind,
        event: &HookEvent,
        executor: &dyn HookActionExecutor,
    ) -> Result<DispatchResult, EngineError> {
        let attachments = self
            .table
            .snapshot(kind, &event.hook)
            .ok_or_else(|| EngineError::HookNotAvailable(event.hook.clone()))?;

        let mut result = DispatchResult::default();
        if attachments.is_empty() {
            return Ok(result);
        }

        debug!(hook = %event.hook, kind = %kind, attachments = attachments.len(), "Firing hook");

        for attachment in attachments {
            if !self.table.contains(kind, &event.hook) {
                debug!(hook = %event.hook, "Hook removed during firing, stopping");
                break;
            }
            if !self.table.is_attached(attachment.id) {
                continue;
            }

            result.fired += 1;
            let triggered = match (attachment.callback)(event) {
                Ok(triggered) => triggered,
                Err(e) => {
                    warn!(
                        hook = %event.hook,
                        attached_by = %attachment.attached_by,
                        error = %e,
                        "Hook callback failed"
                    );
                    result.failures.push(DispatchFailure {
                        attachment: attachment.id,
                        attached_by: attachment.attached_by.clone(),
                        error: e.into(),
                    });
                    continue;
                }
            };
            if !triggered {
                continue;
            }

            let outcome = match (&attachment.action, &attachment.argument) {
                (HookAction::None, _) => Ok(()),
                (HookAction::LoadComponent, HookArgument::ComponentType(component_type)) => {
                    debug!(hook = %event.hook, component = %component_type, "Hook triggered load");
                    executor
                        .load_component(component_type, event.kwargs.clone())
                        .map(|name| result.loaded.push(name))
                }
                (HookAction::UnloadComponent, HookArgument::Instance(instance)) => {
                    debug!(hook = %event.hook, instance = %instance, "Hook triggered unload");
                    executor
                        .unload_component(instance)
                        .map(|()| result.unloaded.push(instance.clone()))
                }
                (action, argument) => {
                    warn!(
                        hook = %event.hook,
                        action = ?action,
                        argument = ?argument,
                        "Hook action has no matching argument, ignoring"
                    );
                    Ok(())
                }
            };

            if let Err(e) = outcome {
                warn!(
                    hook = %event.hook,
                    attached_by = %attachment.attached_by,
                    error = %e,
                    "Hook action failed"
                );
                result.failures.push(DispatchFailure {
                    attachment: attachment.id,
                    attached_by: attachment.attached_by.clone(),
                    error: e,
                });
            }
        }

        Ok(result)
    }

    /// Returns the hook table.
    pub fn table(&self) -> &Arc<HookTable> {
        &self.table
    }
}
