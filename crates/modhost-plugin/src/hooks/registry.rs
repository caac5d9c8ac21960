//! Hook table: named hooks in two tables, each with attachments in
//! attachment order.

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use modhost_core::types::AttachmentId;

use super::definitions::{HookArgument, HookAttachment, HookKind};
use crate::error::EngineError;
use crate::owner::Owner;

/// A named hook.
#[derive(Debug)]
struct Hook {
    /// Installer; the hook is deleted when this instance unloads.
    owner: Owner,
    /// Attachments, first attached first.
    attachments: Vec<HookAttachment>,
}

/// System and custom hook tables.
#[derive(Debug, Default)]
pub struct HookTable {
    system: RwLock<IndexMap<String, Hook>>,
    custom: RwLock<IndexMap<String, Hook>>,
}

impl HookTable {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: HookKind) -> &RwLock<IndexMap<String, Hook>> {
        match kind {
            HookKind::System => &self.system,
            HookKind::Custom => &self.custom,
        }
    }

    /// Installs a system hook. Installing an existing one is a no-op.
    pub fn install_system_hook(&self, name: &str) -> bool {
        let mut system = self.system.write();
        if system.contains_key(name) {
            return false;
        }
        system.insert(
            name.to_string(),
            Hook {
                owner: Owner::Manager,
                attachments: Vec::new(),
            },
        );
        debug!(hook = %name, "System hook installed");
        true
    }

    /// Installs a custom hook. Names are unique across both tables.
    pub fn install_custom_hook(&self, name: &str, owner: Owner) -> Result<(), EngineError> {
        if self.system.read().contains_key(name) {
            return Err(EngineError::HookAlreadyInstalled(name.to_string()));
        }
        let mut custom = self.custom.write();
        if custom.contains_key(name) {
            return Err(EngineError::HookAlreadyInstalled(name.to_string()));
        }
        debug!(hook = %name, owner = %owner, "Custom hook installed");
        custom.insert(
            name.to_string(),
            Hook {
                owner,
                attachments: Vec::new(),
            },
        );
        Ok(())
    }

    /// Appends an attachment to a hook.
    pub fn attach(
        &self,
        kind: HookKind,
        hook: &str,
        attachment: HookAttachment,
    ) -> Result<AttachmentId, EngineError> {
        let mut table = self.table(kind).write();
        let entry = table
            .get_mut(hook)
            .ok_or_else(|| EngineError::HookNotAvailable(hook.to_string()))?;
        let id = attachment.id;
        debug!(
            hook = %hook,
            kind = %kind,
            attached_by = %attachment.attached_by,
            action = ?attachment.action,
            "Callback attached"
        );
        entry.attachments.push(attachment);
        Ok(id)
    }

    /// Detaches an attachment wherever it is. Returns `false` when it was
    /// not attached.
    pub fn detach(&self, id: AttachmentId) -> bool {
        for kind in [HookKind::System, HookKind::Custom] {
            let mut table = self.table(kind).write();
            for (name, hook) in table.iter_mut() {
                let before = hook.attachments.len();
                hook.attachments.retain(|a| a.id != id);
                if hook.attachments.len() != before {
                    debug!(hook = %name, attachment = %id, "Callback detached");
                    return true;
                }
            }
        }
        false
    }

    /// Returns whether an attachment is still attached to any hook.
    pub fn is_attached(&self, id: AttachmentId) -> bool {
        [HookKind::System, HookKind::Custom].into_iter().any(|kind| {
            self.table(kind)
                .read()
                .values()
                .any(|hook| hook.attachments.iter().any(|a| a.id == id))
        })
    }

    /// Attachments of a hook whose argument equals `argument`.
    pub fn find_by_argument(
        &self,
        kind: HookKind,
        hook: &str,
        argument: &HookArgument,
    ) -> Result<Vec<HookAttachment>, EngineError> {
        let table = self.table(kind).read();
        let entry = table
            .get(hook)
            .ok_or_else(|| EngineError::HookNotAvailable(hook.to_string()))?;
        Ok(entry
            .attachments
            .iter()
            .filter(|a| &a.argument == argument)
            .cloned()
            .collect())
    }

    /// Copy of a hook's attachments, or `None` if the hook is absent.
    pub fn snapshot(&self, kind: HookKind, hook: &str) -> Option<Vec<HookAttachment>> {
        self.table(kind)
            .read()
            .get(hook)
            .map(|h| h.attachments.clone())
    }

    pub fn contains(&self, kind: HookKind, hook: &str) -> bool {
        self.table(kind).read().contains_key(hook)
    }

    /// Hook names of a table, in installation order.
    pub fn hook_names(&self, kind: HookKind) -> Vec<String> {
        self.table(kind).read().keys().cloned().collect()
    }

    pub fn hook_owner(&self, kind: HookKind, hook: &str) -> Option<Owner> {
        self.table(kind).read().get(hook).map(|h| h.owner.clone())
    }

    pub fn attachment_count(&self, kind: HookKind, hook: &str) -> usize {
        self.table(kind)
            .read()
            .get(hook)
            .map(|h| h.attachments.len())
            .unwrap_or(0)
    }

    /// Custom hooks installed by `instance`.
    pub(crate) fn custom_hooks_owned_by(&self, instance: &str) -> Vec<String> {
        self.custom
            .read()
            .iter()
            .filter(|(_, hook)| hook.owner.is_instance(instance))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Deletes a custom hook, returning its attachments.
    pub(crate) fn remove_custom_hook(&self, name: &str) -> Option<Vec<HookAttachment>> {
        let removed = self.custom.write().shift_remove(name);
        if removed.is_some() {
            debug!(hook = %name, "Custom hook removed");
        }
        removed.map(|h| h.attachments)
    }

    /// Detaches every attachment, in both tables, attached by or targeting
    /// `instance`. Returns how many were detached.
    pub(crate) fn detach_referencing(&self, instance: &str) -> usize {
        let detached = self.detach_where(|a| a.references(instance));
        if detached > 0 {
            debug!(instance = %instance, detached, "Detached callbacks referencing instance");
        }
        detached
    }

    /// Detaches every attachment, in both tables, made by `instance`.
    /// Attachments merely targeting it stay.
    pub(crate) fn detach_attached_by(&self, instance: &str) -> usize {
        let detached = self.detach_where(|a| a.attached_by.is_instance(instance));
        if detached > 0 {
            debug!(instance = %instance, detached, "Detached callbacks attached by instance");
        }
        detached
    }

    fn detach_where(&self, matches: impl Fn(&HookAttachment) -> bool) -> usize {
        let mut detached = 0;
        for kind in [HookKind::System, HookKind::Custom] {
            let mut table = self.table(kind).write();
            for hook in table.values_mut() {
                let before = hook.attachments.len();
                hook.attachments.retain(|a| !matches(a));
                detached += before - hook.attachments.len();
            }
        }
        detached
    }
}
