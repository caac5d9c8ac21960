//! modhost daemon
//!
//! Loads the configuration, bootstraps the component engine, discovers the
//! bundled components, autoloads and activates what the configuration asks
//! for, then drives `manager.tick` until shut down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{EnvFilter, fmt};

use modhost_core::config::AppConfig;
use modhost_core::error::AppError;
use modhost_plugin::ModuleManager;
use modhost_plugin::activation::ActivationOutcome;
use modhost_plugin_sdk::rules::HookRule;
use plugin_sensor_bus::SensorBusPlugin;
use plugin_sensor_bus::bus::mock::MockBus;

/// modhost: in-process component runtime
#[derive(Debug, Parser)]
#[command(name = "modhost-daemon", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Stop after this many ticks instead of waiting for Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,

    /// Attach a device with this UID to the mock bus (repeatable, hex with 0x)
    #[arg(long = "mock-device", value_parser = parse_uid)]
    mock_devices: Vec<u32>,
}

fn parse_uid(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid device UID '{value}': {e}"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Daemon error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting modhost v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Engine ───────────────────────────────────────────
    let manager = ModuleManager::new(config.engine.clone());

    // ── Step 2: Discovery ────────────────────────────────────────
    let bus = Arc::new(MockBus::new());
    for uid in &cli.mock_devices {
        bus.attach(*uid, &format!("mock-{uid:08x}"));
    }
    let mut plugin = SensorBusPlugin::new(bus);
    if let Some(dir) = &config.engine.structure_dir {
        plugin = plugin.with_structure_dir(dir);
    }
    let report = manager.discover(&plugin);
    tracing::info!(
        discovered = ?report.discovered,
        deferred = report.deferred.len(),
        failed = report.failed.len(),
        "Discovery complete"
    );

    // ── Step 3: Autoload ─────────────────────────────────────────
    for entry in &config.components.autoload {
        match manager.load(&entry.component, entry.kwargs()) {
            Ok(instance) => tracing::info!(instance = %instance, "Autoloaded component"),
            Err(e) => tracing::warn!(component = %entry.component, error = %e, "Autoload failed"),
        }
    }

    // ── Step 4: Hook rules ───────────────────────────────────────
    for rule_config in &config.components.rules {
        let rule = Arc::new(HookRule::from_config(rule_config)?);
        match manager.submit_activation(rule) {
            ActivationOutcome::Activated => tracing::info!(rule = %rule_config.name, "Rule active"),
            ActivationOutcome::Deferred(dependency) => {
                tracing::info!(rule = %rule_config.name, waiting_for = %dependency, "Rule deferred")
            }
            ActivationOutcome::Cancelled(reason) | ActivationOutcome::Failed(reason) => {
                tracing::warn!(rule = %rule_config.name, reason = %reason, "Rule not activated")
            }
        }
    }

    // ── Step 5: Heartbeat ────────────────────────────────────────
    let mut interval = tokio::time::interval(Duration::from_millis(config.engine.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately.
    interval.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        interval_ms = config.engine.tick_interval_ms,
        loaded = manager.loaded_instances().len(),
        "modhost running"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let result = manager.tick();
                if !result.is_clean() {
                    tracing::warn!(failures = result.failures.len(), "Tick handlers failed");
                }
                if cli.ticks.is_some_and(|limit| manager.uptime() >= limit) {
                    tracing::info!(uptime = manager.uptime(), "Tick limit reached");
                    break;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    // ── Step 6: Orderly unload ───────────────────────────────────
    let unloaded = manager.unload_all();
    tracing::info!(unloaded, "modhost stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uid() {
        assert_eq!(parse_uid("0x00010001"), Ok(0x0001_0001));
        assert_eq!(parse_uid("65537"), Ok(65537));
        assert!(parse_uid("0xZZ").is_err());
    }
}
