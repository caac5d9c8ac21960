//! Component autoload configuration.

use serde::{Deserialize, Serialize};

use crate::types::Kwargs;

/// Components loaded by the manager right after discovery, and hook rules
/// activated once their instances exist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentsConfig {
    /// Ordered list of instances to load.
    #[serde(default)]
    pub autoload: Vec<AutoloadEntry>,
    /// Hook rules, activated after autoload.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single autoload request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoloadEntry {
    /// Component type to load.
    pub component: String,
    /// Explicit instance name (defaults to the component type).
    #[serde(default)]
    pub instance_name: Option<String>,
    /// Construction arguments.
    #[serde(default)]
    pub args: Kwargs,
}

impl AutoloadEntry {
    /// Returns the construction kwargs, with `instance_name` merged in when set.
    pub fn kwargs(&self) -> Kwargs {
        let mut kwargs = self.args.clone();
        if let Some(name) = &self.instance_name {
            kwargs.insert(
                "instance_name".to_string(),
                serde_json::Value::String(name.clone()),
            );
        }
        kwargs
    }
}

/// What a hook rule does when its conditions match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Only observe.
    #[default]
    None,
    /// Load `target` as a component type, with the event kwargs.
    Load,
    /// Unload the `target` instance.
    Unload,
}

/// A declarative hook rule.
///
/// ```toml
/// [[components.rules]]
/// name = "thermo-driver"
/// hook = "sensorbus.device_found"
/// requires = "sensorbus"
/// when = { kind = "thermo" }
/// action = "load"
/// target = "sensornode"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule name, used in logs.
    pub name: String,
    /// Hook to attach to.
    pub hook: String,
    /// Component type that must be loaded first.
    #[serde(default)]
    pub requires: Option<String>,
    /// Instance of `requires` that must be loaded; required for
    /// multi-instance types.
    #[serde(default)]
    pub requires_instance: Option<String>,
    /// Event kwargs that must all be present with these values.
    #[serde(default)]
    pub when: Kwargs,
    #[serde(default)]
    pub action: RuleAction,
    /// Component type for `load`, instance name for `unload`.
    #[serde(default)]
    pub target: Option<String>,
}
