//! pipetest Common Library
//!
//! Shared types, errors, configuration and logging for the pipetest
//! fixture tooling.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigLayer, QualityThresholds, TestConfig};
pub use error::{Error, Result};
pub use types::*;

/// pipetest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
