//! Common test utilities
//!
//! In-memory fakes of the two collaborators the reconciler talks to:
//! - [`FakeStore`]: a Vault-like tree with Vault's listing conventions
//! - [`RecordingTarget`]: a target store that records every call in order

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use vault_sync_controller::source::{MountInfo, SecretStoreReader, StoreError};
use vault_sync_controller::target::{TargetError, TargetStoreClient};
use vault_sync_controller::{RecordKey, RecordKind, SecretRecord};

fn trim(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Build a pairs map from string literals
pub fn pairs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// In-memory secret store
#[derive(Debug, Default)]
pub struct FakeStore {
    mounts: HashMap<String, MountInfo>,
    lists: HashMap<String, Vec<String>>,
    leaves: HashMap<String, Map<String, Value>>,
    failing_lists: HashSet<String>,
    rejected_reads: HashMap<String, u16>,
    calls: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a single `secret/` KV mount
    pub fn with_kv_mount() -> Self {
        Self::new().mount("secret/", "kv")
    }

    pub fn mount(mut self, path: &str, mount_type: &str) -> Self {
        self.mounts
            .insert(path.to_string(), MountInfo::new(mount_type));
        self
    }

    /// Set a raw listing, exactly as the store would return it
    pub fn listing(mut self, path: &str, keys: &[&str]) -> Self {
        self.lists.insert(
            trim(path),
            keys.iter().map(|k| (*k).to_string()).collect(),
        );
        self
    }

    /// Add a leaf at `root/namespace/kind/name`, creating the parent
    /// listings with Vault's trailing-separator convention
    pub fn leaf(mut self, root: &str, namespace: &str, kind: &str, name: &str, data: Value) -> Self {
        self.add_child(root, &format!("{namespace}/"));
        let namespace_path = format!("{}/{namespace}", trim(root));
        self.add_child(&namespace_path, &format!("{kind}/"));
        let kind_path = format!("{namespace_path}/{kind}");
        self.add_child(&kind_path, name);

        let data = match data {
            Value::Object(map) => map,
            other => panic!("leaf data must be an object, got {other}"),
        };
        self.leaves.insert(format!("{kind_path}/{name}"), data);
        self
    }

    /// Add a listed leaf whose read returns nothing
    pub fn empty_leaf(mut self, root: &str, namespace: &str, kind: &str, name: &str) -> Self {
        self.add_child(root, &format!("{namespace}/"));
        let namespace_path = format!("{}/{namespace}", trim(root));
        self.add_child(&namespace_path, &format!("{kind}/"));
        self.add_child(&format!("{namespace_path}/{kind}"), name);
        self
    }

    pub fn failing_list(mut self, path: &str) -> Self {
        self.failing_lists.insert(trim(path));
        self
    }

    pub fn rejected_read(mut self, path: &str, status: u16) -> Self {
        self.rejected_reads.insert(trim(path), status);
        self
    }

    fn add_child(&mut self, path: &str, child: &str) {
        let children = self.lists.entry(trim(path)).or_default();
        if !children.iter().any(|c| c == child) {
            children.push(child.to_string());
        }
    }

    /// Every call made so far, as `op:path`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, path: &str) {
        self.calls.lock().unwrap().push(format!("{op}:{}", trim(path)));
    }
}

#[async_trait]
impl SecretStoreReader for FakeStore {
    async fn list_mounts(&self) -> Result<HashMap<String, MountInfo>, StoreError> {
        self.record("mounts", "");
        Ok(self.mounts.clone())
    }

    async fn list(&self, path: &str) -> Result<Option<Vec<String>>, StoreError> {
        self.record("list", path);
        let key = trim(path);
        if self.failing_lists.contains(&key) {
            return Err(StoreError::Backend {
                path: key,
                message: "permission denied".to_string(),
            });
        }
        Ok(self.lists.get(&key).cloned())
    }

    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>, StoreError> {
        self.record("read", path);
        let key = trim(path);
        if let Some(status) = self.rejected_reads.get(&key) {
            return Err(StoreError::Status {
                path: key,
                status: *status,
                message: "permission denied".to_string(),
            });
        }
        Ok(self.leaves.get(&key).cloned())
    }
}

/// One call made against the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCall {
    IsManaged(RecordKey),
    UpsertSecret {
        name: String,
        namespace: String,
        pairs: BTreeMap<String, String>,
    },
    UpsertConfig {
        name: String,
        namespace: String,
        pairs: BTreeMap<String, String>,
    },
    DeleteUnreferenced(Vec<RecordKey>),
}

impl TargetCall {
    pub fn is_upsert(&self) -> bool {
        matches!(
            self,
            TargetCall::UpsertSecret { .. } | TargetCall::UpsertConfig { .. }
        )
    }
}

/// Target store that keeps its objects in memory and records every call
///
/// Objects it holds are managed; foreign objects are never touched.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    foreign: HashSet<RecordKey>,
    failing_writes: HashSet<RecordKey>,
    fail_delete: bool,
    objects: Mutex<BTreeMap<RecordKey, BTreeMap<String, String>>>,
    calls: Mutex<Vec<TargetCall>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// An object created by someone else
    pub fn foreign(mut self, key: RecordKey) -> Self {
        self.foreign.insert(key);
        self
    }

    /// A managed object already present before the pass
    pub fn managed(self, key: RecordKey, data: BTreeMap<String, String>) -> Self {
        self.objects.lock().unwrap().insert(key, data);
        self
    }

    pub fn failing_write(mut self, key: RecordKey) -> Self {
        self.failing_writes.insert(key);
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn calls(&self) -> Vec<TargetCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upserts(&self) -> Vec<TargetCall> {
        self.calls().into_iter().filter(TargetCall::is_upsert).collect()
    }

    pub fn objects(&self) -> BTreeMap<RecordKey, BTreeMap<String, String>> {
        self.objects.lock().unwrap().clone()
    }

    fn write(
        &self,
        kind: RecordKind,
        name: &str,
        namespace: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<(), TargetError> {
        let key = RecordKey::new(namespace, kind, name);
        if self.failing_writes.contains(&key) {
            return Err(TargetError::Write {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: "admission webhook denied the request".into(),
            });
        }
        self.objects.lock().unwrap().insert(key, pairs.clone());
        Ok(())
    }
}

#[async_trait]
impl TargetStoreClient for RecordingTarget {
    async fn is_managed(&self, name: &str, kind: RecordKind, namespace: &str) -> bool {
        let key = RecordKey::new(namespace, kind, name);
        self.calls
            .lock()
            .unwrap()
            .push(TargetCall::IsManaged(key.clone()));
        !self.foreign.contains(&key)
    }

    async fn upsert_secret(
        &self,
        name: &str,
        namespace: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<(), TargetError> {
        self.calls.lock().unwrap().push(TargetCall::UpsertSecret {
            name: name.to_string(),
            namespace: namespace.to_string(),
            pairs: pairs.clone(),
        });
        self.write(RecordKind::Secret, name, namespace, pairs)
    }

    async fn upsert_config(
        &self,
        name: &str,
        namespace: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<(), TargetError> {
        self.calls.lock().unwrap().push(TargetCall::UpsertConfig {
            name: name.to_string(),
            namespace: namespace.to_string(),
            pairs: pairs.clone(),
        });
        self.write(RecordKind::Config, name, namespace, pairs)
    }

    async fn delete_unreferenced(&self, records: &[SecretRecord]) -> Result<(), TargetError> {
        let keys: Vec<RecordKey> = records.iter().map(SecretRecord::key).collect();
        self.calls
            .lock()
            .unwrap()
            .push(TargetCall::DeleteUnreferenced(keys.clone()));

        if self.fail_delete {
            return Err(TargetError::List {
                kind: RecordKind::Secret,
                source: "connection refused".into(),
            });
        }

        let known: HashSet<RecordKey> = keys.into_iter().collect();
        self.objects
            .lock()
            .unwrap()
            .retain(|key, _| known.contains(key));
        Ok(())
    }
}
