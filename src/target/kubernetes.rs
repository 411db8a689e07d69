//! # Kubernetes Target Store
//!
//! Mirrors records into `Secret` and `ConfigMap` objects.
//!
//! ## Ownership
//!
//! Objects written by the controller carry
//! `app.kubernetes.io/managed-by=<manager>`. An object is managed when it does
//! not exist yet or already carries that label. Anything else is left alone.
//!
//! Writes use server-side apply with a fixed field manager, so re-applying
//! identical data is a no-op on the API server.

use super::{BoxError, TargetError, TargetStoreClient};
use crate::constants::MANAGED_BY_LABEL;
use crate::observability::metrics;
use crate::record::{RecordKey, RecordKind, SecretRecord};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use tracing::{debug, error, info, warn};

/// Kubernetes implementation of [`TargetStoreClient`]
#[derive(Clone)]
pub struct KubeTargetStore {
    client: Client,
    manager: String,
    dry_run: bool,
}

impl std::fmt::Debug for KubeTargetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeTargetStore")
            .field("manager", &self.manager)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl KubeTargetStore {
    pub fn new(client: Client, manager: impl Into<String>) -> Self {
        Self {
            client,
            manager: manager.into(),
            dry_run: false,
        }
    }

    /// Send every write and delete as a server-side dry run
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn apply_params(&self) -> PatchParams {
        let mut params = PatchParams::apply(&self.manager).force();
        params.dry_run = self.dry_run;
        params
    }

    fn delete_params(&self) -> DeleteParams {
        DeleteParams {
            dry_run: self.dry_run,
            ..DeleteParams::default()
        }
    }

    fn object_meta(&self, name: &str, namespace: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(ownership_labels(&self.manager)),
            ..ObjectMeta::default()
        }
    }

    /// `Some(owned)` when the object exists, `None` when it does not
    async fn ownership<K>(&self, name: &str, namespace: &str) -> kube::Result<Option<bool>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let object = api.get_opt(name).await?;
        Ok(object.map(|o| is_owned(o.labels(), &self.manager)))
    }

    async fn apply<K>(&self, kind: RecordKind, object: &K) -> Result<(), TargetError>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let name = object.name_any();
        let namespace = object.namespace().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);

        api.patch(&name, &self.apply_params(), &Patch::Apply(object))
            .await
            .map_err(|e| TargetError::Write {
                kind,
                namespace: namespace.clone(),
                name: name.clone(),
                source: Box::new(e),
            })?;

        debug!(%kind, namespace = %namespace, name = %name, dry_run = self.dry_run, "Applied object");
        Ok(())
    }

    async fn list_managed<K>(&self, kind: RecordKind) -> Result<Vec<RecordKey>, TargetError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let selector = format!("{MANAGED_BY_LABEL}={}", self.manager);
        let objects = api
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| TargetError::List {
                kind,
                source: Box::new(e),
            })?;

        Ok(objects
            .items
            .iter()
            .map(|o| RecordKey::new(o.namespace().unwrap_or_default(), kind, o.name_any()))
            .collect())
    }

    async fn delete_object<K>(&self, key: &RecordKey) -> Result<(), TargetError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        match api.delete(&key.name, &self.delete_params()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(object = %key, "Orphan already gone");
                Ok(())
            }
            Err(e) => Err(TargetError::Delete {
                kind: key.kind,
                namespace: key.namespace.clone(),
                name: key.name.clone(),
                source: Box::new(e) as BoxError,
            }),
        }
    }

    /// Delete the orphans of one kind, returning the first failure
    async fn delete_orphans<K>(
        &self,
        kind: RecordKind,
        known: &HashSet<RecordKey>,
    ) -> Result<(), TargetError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let managed = self.list_managed::<K>(kind).await?;
        let mut first_error = None;

        for orphan in select_orphans(managed, known) {
            match self.delete_object::<K>(&orphan).await {
                Ok(()) => {
                    info!(object = %orphan, dry_run = self.dry_run, "Deleted orphaned object");
                    metrics::increment_orphans_deleted(kind);
                }
                Err(e) => {
                    error!(object = %orphan, error = %e, "Failed to delete orphaned object");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl TargetStoreClient for KubeTargetStore {
    async fn is_managed(&self, name: &str, kind: RecordKind, namespace: &str) -> bool {
        let ownership = match kind {
            RecordKind::Secret => self.ownership::<Secret>(name, namespace).await,
            RecordKind::Config => self.ownership::<ConfigMap>(name, namespace).await,
        };

        match ownership {
            Ok(None) => true,
            Ok(Some(owned)) => owned,
            Err(e) => {
                // Never touch what cannot be proven ours
                warn!(%kind, namespace, name, error = %e, "Ownership check failed, treating as unmanaged");
                false
            }
        }
    }

    async fn upsert_secret(
        &self,
        name: &str,
        namespace: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<(), TargetError> {
        let secret = Secret {
            metadata: self.object_meta(name, namespace),
            type_: Some("Opaque".to_string()),
            data: Some(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), ByteString(v.as_bytes().to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        };
        self.apply(RecordKind::Secret, &secret).await
    }

    async fn upsert_config(
        &self,
        name: &str,
        namespace: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<(), TargetError> {
        let config_map = ConfigMap {
            metadata: self.object_meta(name, namespace),
            data: Some(pairs.clone()),
            ..ConfigMap::default()
        };
        self.apply(RecordKind::Config, &config_map).await
    }

    async fn delete_unreferenced(&self, records: &[SecretRecord]) -> Result<(), TargetError> {
        let known: HashSet<RecordKey> = records.iter().map(SecretRecord::key).collect();

        let secrets = self.delete_orphans::<Secret>(RecordKind::Secret, &known).await;
        let configs = self
            .delete_orphans::<ConfigMap>(RecordKind::Config, &known)
            .await;

        secrets.and(configs)
    }
}

/// Labels stamped on every object the controller writes
pub fn ownership_labels(manager: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), manager.to_string())])
}

/// Whether `labels` carry our ownership marker
pub fn is_owned(labels: &BTreeMap<String, String>, manager: &str) -> bool {
    labels
        .get(MANAGED_BY_LABEL)
        .is_some_and(|value| value == manager)
}

/// Managed objects with no source record, in listing order
pub fn select_orphans(managed: Vec<RecordKey>, known: &HashSet<RecordKey>) -> Vec<RecordKey> {
    managed
        .into_iter()
        .filter(|key| !known.contains(key))
        .collect()
}
