//! Vault REST Client
//!
//! Native REST implementation of [`SecretStoreReader`] over the Vault HTTP API.
//! Uses reqwest (rustls) and a static token.
//!
//! Endpoints used:
//! - `GET /v1/sys/mounts` - mount table
//! - `GET /v1/{path}?list=true` - child names
//! - `GET /v1/{path}` - leaf data
//!
//! A `404` on a list or read means "nothing there" and is reported as `None`.
//! Path segments are percent-encoded, so listed names containing `?`, `#` or
//! `%` address the leaf they name.
//!
//! References:
//! - [Vault HTTP API](https://developer.hashicorp.com/vault/api-docs)

use super::{trim_separators, MountInfo, SecretStoreReader, StoreError, PATH_SEPARATOR};
use crate::constants::DEFAULT_VAULT_TIMEOUT_SECS;
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Connection settings for the Vault server
#[derive(Clone)]
pub struct VaultConfig {
    /// Server address, e.g. `https://vault.internal:8200`
    pub address: String,
    pub token: Option<String>,
    /// Enterprise namespace, sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    pub timeout: Duration,
}

impl VaultConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            namespace: None,
            timeout: Duration::from_secs(DEFAULT_VAULT_TIMEOUT_SECS),
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Response Structures
// ============================================================================

/// Response of a `LIST` request
#[derive(Debug, Deserialize)]
struct ListResponse {
    data: ListData,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

/// Response of a read request
///
/// Leaf values are loosely typed; the walker validates them as text.
#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

/// Vault error body: `{"errors": ["..."]}`
#[derive(Debug, Deserialize)]
struct VaultErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault REST client
pub struct VaultReader {
    http_client: Client,
    base_url: Url,
    token: Option<String>,
    namespace: Option<String>,
}

impl std::fmt::Debug for VaultReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultReader")
            .field("base_url", &self.base_url.as_str())
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl VaultReader {
    /// Create a new Vault REST client
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(config.address.trim_end_matches('/'))
            .with_context(|| format!("Invalid Vault address: {}", config.address))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Vault address cannot carry a path: {}", config.address);
        }
        info!(address = %base_url, namespace = ?config.namespace, "Initialized Vault client");

        Ok(Self {
            http_client,
            base_url,
            token: config.token.clone(),
            namespace: config.namespace.clone(),
        })
    }

    /// `{address}/v1/{path}` with every path segment encoded
    fn endpoint(&self, path: &str, list: bool) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the address can always carry a path
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("v1")
                .extend(trim_separators(path).split(PATH_SEPARATOR));
        }
        if list {
            url.query_pairs_mut().append_pair("list", "true");
        }
        url
    }

    fn make_request(&self, path: &str, list: bool) -> reqwest::RequestBuilder {
        let mut request = self.http_client.get(self.endpoint(path, list));
        if let Some(token) = &self.token {
            request = request.header("X-Vault-Token", token);
        }
        if let Some(namespace) = &self.namespace {
            request = request.header("X-Vault-Namespace", namespace);
        }
        request
    }

    /// Issue a request and decode the body, mapping `404` to `None`
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        list: bool,
    ) -> Result<Option<T>, StoreError> {
        let start = Instant::now();
        let result = self.send(path, list).await;
        metrics::observe_store_request(operation, start.elapsed().as_secs_f64());

        let Some(response) = result? else {
            return Ok(None);
        };

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| StoreError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    async fn send(&self, path: &str, list: bool) -> Result<Option<reqwest::Response>, StoreError> {
        let response = self
            .make_request(path, list)
            .send()
            .await
            .map_err(|source| StoreError::Request {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            debug!(path, status = status.as_u16(), "Nothing stored at path");
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            metrics::increment_store_request_errors();
            return Err(StoreError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(&error_text),
            });
        }

        Ok(Some(response))
    }
}

/// Flatten a Vault error body, falling back to the raw text
fn error_message(body: &str) -> String {
    match serde_json::from_str::<VaultErrorResponse>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ => body.trim().to_string(),
    }
}

/// Extract the mount table from a `sys/mounts` body
///
/// Newer servers duplicate the table under `data`; older ones only return it
/// at the top level next to request metadata.
fn parse_mount_table(body: &Value) -> HashMap<String, MountInfo> {
    let table = body
        .get("data")
        .and_then(Value::as_object)
        .or_else(|| body.as_object());

    table
        .into_iter()
        .flatten()
        .filter_map(|(path, entry)| {
            let mount_type = entry.get("type")?.as_str()?;
            Some((path.clone(), MountInfo::new(mount_type)))
        })
        .collect()
}

#[async_trait]
impl SecretStoreReader for VaultReader {
    async fn list_mounts(&self) -> Result<HashMap<String, MountInfo>, StoreError> {
        let path = "sys/mounts";
        let body: Value = self
            .get_json("list_mounts", path, false)
            .await?
            .ok_or_else(|| StoreError::Status {
                path: path.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
                message: "mount table not found".to_string(),
            })?;

        let mounts = parse_mount_table(&body);
        debug!(mounts = mounts.len(), "Listed mounts");
        Ok(mounts)
    }

    async fn list(&self, path: &str) -> Result<Option<Vec<String>>, StoreError> {
        let response: Option<ListResponse> = self.get_json("list", path, true).await?;
        Ok(response.map(|r| r.data.keys))
    }

    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>, StoreError> {
        let response: Option<ReadResponse> = self.get_json("read", path, false).await?;
        Ok(response.and_then(|r| r.data))
    }
}
