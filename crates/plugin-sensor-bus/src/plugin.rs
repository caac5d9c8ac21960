//! Discovery entry point for the sensor bus components.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error};

use modhost_plugin::EngineError;
use modhost_plugin::discovery::{ComponentCandidate, DiscoverySource};
use modhost_plugin_sdk::exports::ComponentExport;

use crate::bus::{SensorBus, device_class};
use crate::{master, node};

/// Publishes `sensornode` and `sensorbus` over one bus backend.
///
/// The node driver is listed first and stays deferred until the master is
/// registered.
#[derive(Debug, Clone)]
pub struct SensorBusPlugin {
    bus: Arc<dyn SensorBus>,
    class_drivers: Vec<(u32, String)>,
    structure_dir: Option<PathBuf>,
}

impl SensorBusPlugin {
    /// Creates the plugin with the node driver registered for its class.
    pub fn new(bus: Arc<dyn SensorBus>) -> Self {
        Self {
            bus,
            class_drivers: vec![(node::DEVICE_CLASS, node::COMPONENT_TYPE.to_string())],
            structure_dir: None,
        }
    }

    /// Registers an extra driver type for a device class.
    pub fn with_class_driver(mut self, class: u32, component_type: impl Into<String>) -> Self {
        self.class_drivers.push((device_class(class), component_type.into()));
        self
    }

    /// Reads `sensornode.json` from `dir` when present instead of the
    /// embedded structure document.
    pub fn with_structure_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.structure_dir = Some(dir.into());
        self
    }

    fn node_export(&self) -> Result<ComponentExport, EngineError> {
        if let Some(dir) = &self.structure_dir {
            let path = dir.join(format!("{}.json", node::COMPONENT_TYPE));
            if path.is_file() {
                debug!(path = %path.display(), "Using structure document from disk");
                return node::export_from_file(&path);
            }
        }
        node::export()
    }

    /// The exports this plugin publishes, in discovery order.
    pub fn exports(&self) -> Result<Vec<ComponentExport>, EngineError> {
        Ok(vec![
            self.node_export()?,
            master::export(self.bus.clone(), self.class_drivers.clone()),
        ])
    }
}

impl DiscoverySource for SensorBusPlugin {
    fn candidates(&self) -> Vec<Arc<dyn ComponentCandidate>> {
        match self.exports() {
            Ok(exports) => exports.into_iter().map(ComponentExport::into_candidate).collect(),
            Err(e) => {
                error!(error = %e, "Sensor bus exports are invalid");
                Vec::new()
            }
        }
    }
}
