//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default poll interval between reconciliation passes (seconds)
pub const DEFAULT_SYNC_PERIOD_SECS: u64 = 300;

/// Default timeout for a single Vault request (seconds)
pub const DEFAULT_VAULT_TIMEOUT_SECS: u64 = 30;

/// Default ownership label value and server-side apply field manager
pub const DEFAULT_MANAGER_NAME: &str = "vault-sync-controller";

/// Label marking a target object as written by this controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
