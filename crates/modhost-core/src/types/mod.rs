//! Core type definitions used across the modhost workspace.

pub mod id;
pub mod kwargs;

pub use id::*;
pub use kwargs::{Kwargs, KwargsExt};
