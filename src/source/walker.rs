//! # Tree Walker
//!
//! Enumerates every record under the configured root path.
//!
//! ## Layout
//!
//! ```text
//! <root>/<namespace>/<kind>/<name>
//! ```
//!
//! where `<kind>` is `secrets` or `configmaps`. Any other entry at the kind
//! level is skipped without producing records or errors.
//!
//! ## Failure Semantics
//!
//! A failing list call anywhere in the hierarchy aborts the walk, since a
//! broken intermediate listing usually means an access problem affecting
//! everything. A leaf that is absent, or whose read is refused by policy
//! (`403`), yields a record with empty pairs so one bad leaf does not hide its
//! siblings. Any other failed leaf read aborts the walk: a `5xx` or `429` is a
//! store outage, and mirroring it as empty data would blank live objects. A
//! leaf value that is not text aborts the walk.

use super::{
    join_path, trim_separators, MountInfo, SecretStoreReader, StoreError, KV_MOUNT_TYPE,
    PATH_SEPARATOR,
};
use crate::record::{MountDescriptor, RecordKey, RecordKind, SecretRecord};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Status Vault answers when the token's policy denies one leaf
const LEAF_REFUSED_STATUS: u16 = 403;

/// Walks the secret store and materializes [`SecretRecord`]s
#[derive(Clone)]
pub struct TreeWalker {
    store: Arc<dyn SecretStoreReader>,
    warn_on_unknown_kinds: bool,
}

impl std::fmt::Debug for TreeWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("warn_on_unknown_kinds", &self.warn_on_unknown_kinds)
            .finish_non_exhaustive()
    }
}

impl TreeWalker {
    pub fn new(store: Arc<dyn SecretStoreReader>) -> Self {
        Self {
            store,
            warn_on_unknown_kinds: false,
        }
    }

    /// Log unrecognized kind listings at WARN instead of DEBUG
    #[must_use]
    pub fn with_unknown_kind_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_unknown_kinds = enabled;
        self
    }

    /// Walk every KV mount that prefixes `root_path`
    ///
    /// Record order follows the store's listing order.
    ///
    /// # Errors
    /// Returns a [`StoreError`] if any listing fails or a leaf holds a
    /// non-text value.
    pub async fn walk(&self, root_path: &str) -> Result<Vec<SecretRecord>, StoreError> {
        let mounts = self.store.list_mounts().await?;
        let descriptors = select_mounts(&mounts, root_path);

        if descriptors.is_empty() {
            warn!(root_path, "No KV mount matches the configured root path");
        }

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut walked_roots = HashSet::new();

        for descriptor in &descriptors {
            // Every descriptor shares the configured root; walking it twice
            // would emit every record twice.
            if !walked_roots.insert(descriptor.keys_path.clone()) {
                debug!(
                    mount = %descriptor.mount_path,
                    "Root already walked through another mount, skipping"
                );
                continue;
            }
            self.walk_mount(descriptor, &mut records, &mut seen).await?;
        }

        info!(root_path, records = records.len(), "Discovered records");
        Ok(records)
    }

    async fn walk_mount(
        &self,
        descriptor: &MountDescriptor,
        records: &mut Vec<SecretRecord>,
        seen: &mut HashSet<RecordKey>,
    ) -> Result<(), StoreError> {
        let keys_path = descriptor.keys_path.as_str();
        debug!(mount = %descriptor.mount_path, keys_path, "Walking mount");

        let Some(namespaces) = self.store.list(keys_path).await? else {
            debug!(keys_path, "No namespaces under root yet");
            return Ok(());
        };

        for namespace in namespaces.iter().map(|n| trim_separators(n)) {
            if namespace.is_empty() {
                continue;
            }
            let namespace_path = join_path(keys_path, namespace);

            let kinds = self.store.list(&namespace_path).await?.unwrap_or_default();
            for kind_name in kinds.iter().map(|k| trim_separators(k)) {
                let Some(kind) = RecordKind::from_listing(kind_name) else {
                    if self.warn_on_unknown_kinds {
                        warn!(namespace, kind = kind_name, "Skipping unrecognized kind");
                    } else {
                        debug!(namespace, kind = kind_name, "Skipping unrecognized kind");
                    }
                    continue;
                };

                let kind_path = join_path(&namespace_path, kind.listing_name());
                let names = self.store.list(&kind_path).await?.unwrap_or_default();

                for name in names.iter().map(|n| trim_separators(n)) {
                    if name.is_empty() {
                        continue;
                    }
                    let key = RecordKey::new(namespace, kind, name);
                    if seen.contains(&key) {
                        debug!(record = %key, "Duplicate listing entry, skipping");
                        continue;
                    }

                    let leaf_path = join_path(&kind_path, name);
                    let pairs = self.read_pairs(&leaf_path).await?;
                    debug!(record = %key, keys = pairs.len(), "Found record");

                    seen.insert(key);
                    records.push(SecretRecord::new(name, namespace, kind, pairs));
                }
            }
        }

        Ok(())
    }

    /// Read a leaf as text pairs; absent or refused leaves become empty
    async fn read_pairs(&self, leaf_path: &str) -> Result<BTreeMap<String, String>, StoreError> {
        match self.store.read(leaf_path).await {
            Ok(Some(data)) => text_pairs(leaf_path, data),
            Ok(None) => Ok(BTreeMap::new()),
            Err(StoreError::Status {
                status: LEAF_REFUSED_STATUS,
                message,
                ..
            }) => {
                warn!(
                    path = leaf_path,
                    error = %message,
                    "Leaf read was refused, mirroring it with no data"
                );
                Ok(BTreeMap::new())
            }
            // Server-side and throttling failures say nothing about the leaf
            Err(e) => Err(e),
        }
    }
}

/// Select the KV mounts whose path prefixes `root_path`
///
/// Each descriptor keeps the configured root as its keys path. The result is
/// sorted by mount path.
pub fn select_mounts(mounts: &HashMap<String, MountInfo>, root_path: &str) -> Vec<MountDescriptor> {
    let trimmed_root = trim_separators(root_path);

    let mut selected: Vec<MountDescriptor> = mounts
        .iter()
        .filter(|(mount_path, info)| {
            info.mount_type == KV_MOUNT_TYPE
                && !mount_path.is_empty()
                && trimmed_root.starts_with(mount_path.as_str())
        })
        .map(|(mount_path, _)| MountDescriptor {
            mount_path: mount_path.clone(),
            keys_path: root_path.to_string(),
        })
        .collect();

    selected.sort_by(|a, b| a.mount_path.cmp(&b.mount_path));
    selected
}

/// Require every leaf value to be text
fn text_pairs(
    leaf_path: &str,
    data: Map<String, Value>,
) -> Result<BTreeMap<String, String>, StoreError> {
    data.into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            _ => Err(StoreError::NonTextValue {
                path: leaf_path.trim_end_matches(PATH_SEPARATOR).to_string(),
                key,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mounts(entries: &[(&str, &str)]) -> HashMap<String, MountInfo> {
        entries
            .iter()
            .map(|(path, kind)| ((*path).to_string(), MountInfo::new(*kind)))
            .collect()
    }

    #[test]
    fn test_select_mounts_keeps_only_kv_prefixes() {
        let table = mounts(&[
            ("secret/", "kv"),
            ("sys/", "system"),
            ("pki/", "pki"),
            ("other/", "kv"),
            ("cubbyhole/", "cubbyhole"),
        ]);

        let selected = select_mounts(&table, "secret/data/apps");
        assert_eq!(
            selected,
            vec![MountDescriptor {
                mount_path: "secret/".to_string(),
                keys_path: "secret/data/apps".to_string(),
            }]
        );
    }

    #[test]
    fn test_select_mounts_trims_root_before_matching() {
        let table = mounts(&[("secret/", "kv")]);
        let selected = select_mounts(&table, "/secret/apps/");
        assert_eq!(selected.len(), 1);
        // Keys path keeps the configured root untouched
        assert_eq!(selected[0].keys_path, "/secret/apps/");
    }

    #[test]
    fn test_select_mounts_ignores_non_kv_prefix() {
        let table = mounts(&[("secret/", "transit")]);
        assert!(select_mounts(&table, "secret/apps").is_empty());
    }

    #[test]
    fn test_text_pairs_rejects_non_text() {
        let mut data = Map::new();
        data.insert("user".to_string(), json!("a"));
        data.insert("port".to_string(), json!(5432));

        let err = text_pairs("secret/apps/ns/secrets/db", data).unwrap_err();
        match err {
            StoreError::NonTextValue { path, key } => {
                assert_eq!(path, "secret/apps/ns/secrets/db");
                assert_eq!(key, "port");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_text_pairs_copies_every_entry() {
        let mut data = Map::new();
        data.insert("user".to_string(), json!("a"));
        data.insert("pass".to_string(), json!("b"));

        let pairs = text_pairs("p", data).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["user"], "a");
        assert_eq!(pairs["pass"], "b");
    }
}
