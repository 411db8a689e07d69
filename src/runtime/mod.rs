//! # Runtime
//!
//! Timer-driven execution of reconciliation passes.

pub mod scheduler;
pub mod state;

pub use scheduler::{run_pass, shutdown_signal, Scheduler};
pub use state::{PassSnapshot, PassState};
