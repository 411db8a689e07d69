//! # Records
//!
//! Types describing what the tree walker discovers in Vault.
//!
//! A [`SecretRecord`] is created fresh on every pass, never mutated after
//! the walker hands it over, and dropped when the pass ends. The target
//! store is the only durable copy.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Listing name of the secret-like leaf collection
pub const SECRETS_KIND: &str = "secrets";

/// Listing name of the config-like leaf collection
pub const CONFIGMAPS_KIND: &str = "configmaps";

/// Leaf collection category of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// Mirrored into a Kubernetes `Secret`
    Secret,
    /// Mirrored into a Kubernetes `ConfigMap`
    Config,
}

impl RecordKind {
    /// Name of this kind as it appears in a Vault listing
    pub fn listing_name(self) -> &'static str {
        match self {
            RecordKind::Secret => SECRETS_KIND,
            RecordKind::Config => CONFIGMAPS_KIND,
        }
    }

    /// Map a (separator-trimmed) listing entry onto a kind.
    ///
    /// Returns `None` for anything other than the two supported collections.
    pub fn from_listing(name: &str) -> Option<Self> {
        match name {
            SECRETS_KIND => Some(RecordKind::Secret),
            CONFIGMAPS_KIND => Some(RecordKind::Config),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.listing_name())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_listing(s).ok_or_else(|| format!("unsupported record kind: {s}"))
    }
}

/// Identity of a record within one pass: `(namespace, kind, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub namespace: String,
    pub kind: RecordKind,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, kind: RecordKind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

/// One leaf discovered in Vault
///
/// `pairs` holds every key/value found at the leaf. An absent leaf yields an
/// empty map, never an error.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub name: String,
    pub namespace: String,
    pub kind: RecordKind,
    pub pairs: BTreeMap<String, String>,
}

impl SecretRecord {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        kind: RecordKind,
        pairs: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            kind,
            pairs,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.namespace.clone(), self.kind, self.name.clone())
    }
}

// Values are secret material; only the keys are printed.
impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("kind", &self.kind)
            .field("keys", &self.pairs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A KV mount selected for walking
///
/// `keys_path` is the configured root path, not the mount path: namespaces
/// are discovered under the full configured root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountDescriptor {
    pub mount_path: String,
    pub keys_path: String,
}
