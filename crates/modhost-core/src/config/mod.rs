//! Application configuration schemas.
//!
//! The configuration is deserialized from an optional TOML file merged with
//! `MODHOST__`-prefixed environment variables via the `config` crate. Each
//! sub-module represents a logical configuration section.

pub mod components;
pub mod engine;
pub mod logging;

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::components::{AutoloadEntry, ComponentsConfig, RuleAction, RuleConfig};
pub use self::engine::EngineConfig;
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Lifecycle controller settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Components loaded at startup.
    #[serde(default)]
    pub components: ComponentsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file (optional) and the environment.
    ///
    /// Environment variables use the `MODHOST` prefix with `__` as the
    /// section separator, e.g. `MODHOST__ENGINE__TICK_INTERVAL_MS=250`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("MODHOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        Self::finish(config)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> Result<Self, AppError> {
        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        parsed.engine.validate()?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_empty() {
        let config = AppConfig::from_toml_str("").expect("parse");
        assert_eq!(config.engine.max_replay_depth, 32);
        assert_eq!(config.engine.tick_interval_ms, 1000);
        assert!(config.components.autoload.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_autoload_entries() {
        let toml = r#"
            [[components.autoload]]
            component = "sensorbus"

            [[components.autoload]]
            component = "sensornode"
            instance_name = "kitchen"
            args = { uid = 4097 }
        "#;
        let config = AppConfig::from_toml_str(toml).expect("parse");
        assert_eq!(config.components.autoload.len(), 2);

        let kwargs = config.components.autoload[1].kwargs();
        assert_eq!(kwargs["instance_name"], "kitchen");
        assert_eq!(kwargs["uid"], 4097);
    }

    #[test]
    fn test_rule_entries() {
        let toml = r#"
            [[components.rules]]
            name = "thermo-driver"
            hook = "sensorbus.device_found"
            requires = "sensorbus"
            when = { kind = "thermo" }
            action = "load"
            target = "sensornode"
        "#;
        let config = AppConfig::from_toml_str(toml).expect("parse");
        let rule = &config.components.rules[0];
        assert_eq!(rule.action, RuleAction::Load);
        assert_eq!(rule.requires.as_deref(), Some("sensorbus"));
        assert_eq!(rule.when["kind"], "thermo");
        assert!(rule.requires_instance.is_none());
    }

    #[test]
    fn test_rejects_zero_replay_depth() {
        let toml = "[engine]\nmax_replay_depth = 0\n";
        let err = AppConfig::from_toml_str(toml).expect_err("should reject");
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        writeln!(file, "[logging]\nformat = \"json\"").expect("write");

        let config = AppConfig::load(file.path()).expect("load");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").expect("load");
        assert_eq!(config.engine.max_replay_depth, 32);
    }
}
