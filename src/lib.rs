//! # Vault Sync Controller
//!
//! Periodically mirrors secrets stored in HashiCorp Vault into Kubernetes
//! `Secret` and `ConfigMap` objects, and removes mirrored objects whose source
//! no longer exists.
//!
//! ## Vault Layout
//!
//! ```text
//! <root>/<namespace>/secrets/<name>     -> Secret <namespace>/<name>
//! <root>/<namespace>/configmaps/<name>  -> ConfigMap <namespace>/<name>
//! ```
//!
//! ## Components
//!
//! - [`source`]: Vault reader and the tree walker that enumerates records
//! - [`target`]: Kubernetes writer with the ownership-label convention
//! - [`reconciler`]: one pass of discovery, upsert, and orphan cleanup
//! - [`runtime`]: the timer loop driving passes
//!
//! Only one controller instance may reconcile a given cluster scope at a time;
//! concurrent instances are unsupported and may race on writes and deletes.

pub mod cli;
pub mod config;
pub mod constants;
pub mod observability;
pub mod reconciler;
pub mod record;
pub mod runtime;
pub mod server;
pub mod source;
pub mod target;

pub use reconciler::{OrphanCleanup, PassSummary, ReconcileDriver, ReconcilerError};
pub use record::{MountDescriptor, RecordKey, RecordKind, SecretRecord};
