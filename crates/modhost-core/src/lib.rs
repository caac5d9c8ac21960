//! # modhost-core
//!
//! Core crate for the modhost extension runtime. Contains configuration
//! schemas, typed identifiers, dynamic argument types, the fixed set of
//! system hook names, and the unified error system.
//!
//! This crate has **no** internal dependencies on other modhost crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
