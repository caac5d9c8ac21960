//! # modhost-plugin-sdk
//!
//! Helpers for writing components and external consumers for modhost.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use modhost_plugin_sdk::prelude::*;
//!
//! struct Lamp(CapabilityTable);
//!
//! impl Component for Lamp {
//!     fn capabilities(&self) -> &CapabilityTable {
//!         &self.0
//!     }
//! }
//!
//! let export = ComponentExport::new(
//!     ComponentDescriptor::new("lamp", "A dimmable lamp"),
//!     factory(|_ctx| Ok(Arc::new(Lamp(CapabilityTable::new())) as Arc<dyn Component>)),
//! )
//! .requires("sensorbus");
//!
//! manager.discover(&StaticSource::new().with(export.into_candidate()));
//!
//! let rule = HookRule::new("lamp-on-motion", "sensorbus.device_found")
//!     .requires("sensorbus", None)
//!     .when("kind", "motion")
//!     .then_load("lamp");
//! manager.submit_activation(Arc::new(rule));
//! ```

pub mod exports;
pub mod rules;

/// Prelude for convenient imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use modhost_plugin::prelude::*;

    pub use crate::exports::ComponentExport;
    pub use crate::rules::HookRule;
}
