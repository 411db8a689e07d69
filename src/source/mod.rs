//! # Secret Store Source
//!
//! Read-only access to the hierarchical KV store the controller mirrors from.
//!
//! - [`SecretStoreReader`]: the capability the tree walker consumes
//! - [`vault`]: native REST implementation over the Vault HTTP API
//! - [`walker`]: mount selection and namespace/kind/name traversal

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

pub mod vault;
pub mod walker;

pub use vault::{VaultConfig, VaultReader};
pub use walker::TreeWalker;

/// Mount type of the key/value secrets engine
pub const KV_MOUNT_TYPE: &str = "kv";

/// Path separator used by the store
pub const PATH_SEPARATOR: char = '/';

/// A mount table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Engine type, e.g. `kv`, `pki`, `transit`
    pub mount_type: String,
}

impl MountInfo {
    pub fn new(mount_type: impl Into<String>) -> Self {
        Self {
            mount_type: mount_type.into(),
        }
    }
}

/// Failure listing or reading the source hierarchy
///
/// Always fatal to the current pass.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("store returned status {status} for {path}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    #[error("failed to decode store response for {path}: {message}")]
    Decode { path: String, message: String },

    #[error("value of key '{key}' at {path} is not text")]
    NonTextValue { path: String, key: String },

    #[error("store backend error for {path}: {message}")]
    Backend { path: String, message: String },
}

/// Black-box read API of the secret store
#[async_trait]
pub trait SecretStoreReader: Send + Sync {
    /// All mounts known to the store, keyed by mount path (e.g. `secret/`)
    async fn list_mounts(&self) -> Result<HashMap<String, MountInfo>, StoreError>;

    /// Child names under `path`, or `None` when nothing exists there.
    ///
    /// Directory-like entries may carry a trailing separator.
    async fn list(&self, path: &str) -> Result<Option<Vec<String>>, StoreError>;

    /// Leaf data at `path`, or `None` when the leaf holds no data
    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>, StoreError>;
}

/// Strip leading and trailing separators
pub(crate) fn trim_separators(path: &str) -> &str {
    path.trim_matches(PATH_SEPARATOR)
}

/// Join path segments with the store separator
pub(crate) fn join_path(base: &str, child: &str) -> String {
    format!("{}{}{}", base.trim_end_matches(PATH_SEPARATOR), PATH_SEPARATOR, child)
}
