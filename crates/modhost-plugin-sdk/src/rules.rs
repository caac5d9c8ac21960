//! Declarative hook rules: external consumers that wait for an instance,
//! then attach a conditional action to a hook.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use modhost_core::config::{RuleAction, RuleConfig};
use modhost_core::events::SystemHook;
use modhost_core::types::{AttachmentId, Kwargs};
use modhost_plugin::activation::{Activation, ActivationConsumer};
use modhost_plugin::hooks::definitions::{HookAttachment, HookKind, hook_callback};
use modhost_plugin::{CallbackError, EngineError, HookAction, HookArgument, ModuleManager, Owner};

/// Attaches to `hook` once the required instance is loaded. When an event
/// carries every `when` pair, the action runs as the manager.
#[derive(Debug)]
pub struct HookRule {
    name: String,
    hook: String,
    requires: Option<(String, Option<String>)>,
    conditions: Kwargs,
    action: HookAction,
    argument: HookArgument,
    attached: Mutex<Option<AttachmentId>>,
}

impl HookRule {
    pub fn new(name: impl Into<String>, hook: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hook: hook.into(),
            requires: None,
            conditions: Kwargs::new(),
            action: HookAction::None,
            argument: HookArgument::None,
            attached: Mutex::new(None),
        }
    }

    /// Builds a rule from its configuration entry.
    pub fn from_config(config: &RuleConfig) -> Result<Self, EngineError> {
        let mut rule = Self::new(&config.name, &config.hook);
        if let Some(component_type) = &config.requires {
            rule = rule.requires(component_type, config.requires_instance.as_deref());
        }
        rule.conditions = config.when.clone();

        let target = || {
            config.target.clone().ok_or_else(|| EngineError::MissingArgument {
                component_type: format!("rule '{}'", config.name),
                argument: "target".to_string(),
            })
        };
        Ok(match config.action {
            RuleAction::None => rule,
            RuleAction::Load => rule.then_load(target()?),
            RuleAction::Unload => rule.then_unload(target()?),
        })
    }

    /// Waits for an instance of `component_type` (a specific one when
    /// `instance` is set) before attaching.
    pub fn requires(mut self, component_type: impl Into<String>, instance: Option<&str>) -> Self {
        self.requires = Some((component_type.into(), instance.map(str::to_string)));
        self
    }

    /// Adds a condition on the event kwargs.
    pub fn when(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Loads `component_type` with the event kwargs on a match.
    pub fn then_load(mut self, component_type: impl Into<String>) -> Self {
        self.action = HookAction::LoadComponent;
        self.argument = HookArgument::ComponentType(component_type.into());
        self
    }

    /// Unloads `instance` on a match.
    pub fn then_unload(mut self, instance: impl Into<String>) -> Self {
        self.action = HookAction::UnloadComponent;
        self.argument = HookArgument::Instance(instance.into());
        self
    }

    /// The attachment made on activation, if any.
    pub fn attachment(&self) -> Option<AttachmentId> {
        *self.attached.lock()
    }

    /// Detaches the rule from its hook.
    pub fn detach(&self, manager: &ModuleManager) -> bool {
        self.attached
            .lock()
            .take()
            .is_some_and(|id| manager.detach_hook(id))
    }

    fn hook_kind(&self) -> HookKind {
        if SystemHook::from_name(&self.hook).is_some() {
            HookKind::System
        } else {
            HookKind::Custom
        }
    }
}

impl ActivationConsumer for HookRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn activate(&self, manager: &ModuleManager) -> Result<Activation, CallbackError> {
        if let Some((component_type, instance)) = &self.requires {
            if let Some(dependency) = manager.require_instance(component_type, instance.as_deref())? {
                return Ok(Activation::Defer(dependency));
            }
        }

        let conditions = self.conditions.clone();
        let rule = self.name.clone();
        let attachment = HookAttachment::new(
            Owner::Manager,
            hook_callback(move |event| {
                let matched = conditions
                    .iter()
                    .all(|(key, expected)| event.get(key) == Some(expected));
                if matched {
                    info!(rule = %rule, hook = %event.hook, kwargs = ?event.kwargs, "Rule matched");
                }
                Ok(matched)
            }),
        )
        .with_action(self.action, self.argument.clone());

        let kind = self.hook_kind();
        let attached = match kind {
            HookKind::System => manager.attach_system_hook(&self.hook, attachment),
            HookKind::Custom => manager.attach_custom_hook(&self.hook, attachment),
        };
        match attached {
            Ok(id) => {
                debug!(rule = %self.name, hook = %self.hook, attachment = %id, "Rule attached");
                *self.attached.lock() = Some(id);
                Ok(Activation::Ready)
            }
            Err(EngineError::HookNotAvailable(hook)) => {
                info!(rule = %self.name, hook = %hook, "Rule hook does not exist, cancelling");
                Ok(Activation::Cancel(format!("hook '{hook}' is not available")))
            }
            Err(e) => Err(e.into()),
        }
    }
}
