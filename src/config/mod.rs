//! # Configuration
//!
//! Startup configuration read from the environment.

pub mod sync;

pub use sync::{ConfigError, SyncConfig};
