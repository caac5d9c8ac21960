//! System hooks fired by the lifecycle controller.
//!
//! These hooks are installed once at engine bootstrap and are owned by the
//! manager. Components attach to them; they are never removed.

use serde::{Deserialize, Serialize};

/// Owner string recorded for everything the manager itself installs or loads.
pub const MANAGER_OWNER: &str = "manager";

/// Kwarg the engine injects into every instance's construction arguments.
pub const LOADED_BY_KEY: &str = "loaded_by";

/// Enumeration of the fixed system hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHook {
    /// Fired after an instance was committed. Event kwargs: `instance_name`.
    ModuleLoaded,
    /// Fired after an instance was removed. Event kwargs: `instance_name`,
    /// `requested_by`.
    ModuleUnloaded,
    /// Heartbeat. Event kwargs: `uptime` (tick count).
    Tick,
}

impl SystemHook {
    /// All system hooks, in installation order.
    pub const ALL: [SystemHook; 3] = [Self::ModuleLoaded, Self::ModuleUnloaded, Self::Tick];

    /// Returns the hook name components attach to.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleLoaded => "manager.module_loaded",
            Self::ModuleUnloaded => "manager.module_unloaded",
            Self::Tick => "manager.tick",
        }
    }

    /// Looks a system hook up by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.as_str() == name)
    }
}

impl std::fmt::Display for SystemHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
