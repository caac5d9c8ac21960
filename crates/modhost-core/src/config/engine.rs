//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Tunables for the lifecycle controller.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on nested deferred-entry replays and recursive discovery
    /// retries. Exceeding it leaves the entry pending and logs a diagnostic.
    #[serde(default = "default_max_replay_depth")]
    #[validate(range(min = 1, max = 1024))]
    pub max_replay_depth: usize,
    /// Heartbeat period used by the daemon to fire `manager.tick`.
    #[serde(default = "default_tick_interval_ms")]
    #[validate(range(min = 10))]
    pub tick_interval_ms: u64,
    /// Directory holding component structure documents, if any.
    #[serde(default)]
    pub structure_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_replay_depth: default_max_replay_depth(),
            tick_interval_ms: default_tick_interval_ms(),
            structure_dir: None,
        }
    }
}

fn default_max_replay_depth() -> usize {
    32
}

fn default_tick_interval_ms() -> u64 {
    1000
}
