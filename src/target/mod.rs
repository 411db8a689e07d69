//! # Target Store
//!
//! Write side of the sync: the platform objects records are mirrored into.
//!
//! The ownership convention (how an object is marked as ours) lives entirely
//! behind [`TargetStoreClient`]. The reconciler only sees the opaque
//! `is_managed` predicate.

use crate::record::{RecordKind, SecretRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod kubernetes;

pub use kubernetes::KubeTargetStore;

/// Boxed source error so fakes and real clients share one error type
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TargetError {
    /// Upserting one record failed; reported, never fatal to the pass
    #[error("failed to write {kind} {namespace}/{name}: {source}")]
    Write {
        kind: RecordKind,
        namespace: String,
        name: String,
        #[source]
        source: BoxError,
    },

    /// Removing an orphan failed
    #[error("failed to delete orphaned {kind} {namespace}/{name}: {source}")]
    Delete {
        kind: RecordKind,
        namespace: String,
        name: String,
        #[source]
        source: BoxError,
    },

    /// Enumerating managed objects for orphan cleanup failed
    #[error("failed to list managed {kind}: {source}")]
    List {
        kind: RecordKind,
        #[source]
        source: BoxError,
    },
}

/// Black-box CRUD API of the target platform
#[async_trait]
pub trait TargetStoreClient: Send + Sync {
    /// Whether the object `(namespace, kind, name)` may be created or modified
    async fn is_managed(&self, name: &str, kind: RecordKind, namespace: &str) -> bool;

    /// Create or replace the secret-like object
    async fn upsert_secret(
        &self,
        name: &str,
        namespace: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<(), TargetError>;

    /// Create or replace the config-like object
    async fn upsert_config(
        &self,
        name: &str,
        namespace: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<(), TargetError>;

    /// Delete every managed object that has no counterpart in `records`
    async fn delete_unreferenced(&self, records: &[SecretRecord]) -> Result<(), TargetError>;
}
