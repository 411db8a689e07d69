//! # Sync Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_MANAGER_NAME, DEFAULT_METRICS_PORT, DEFAULT_SYNC_PERIOD_SECS,
    DEFAULT_VAULT_TIMEOUT_SECS,
};
use crate::source::VaultConfig;
use std::time::Duration;
use thiserror::Error;

/// Default Vault address, matching the official client's default
pub const DEFAULT_VAULT_ADDR: &str = "https://127.0.0.1:8200";

/// Missing or malformed startup configuration
///
/// Fatal at process start, before any pass runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Must set {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Controller configuration
///
/// Only the root path is required; everything else has a default.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Vault path walked on every pass (`VK_VAULT_ROOT_MOUNT_PATH`)
    pub root_path: String,
    /// Interval between passes (`VK_SYNC_PERIOD`, seconds)
    pub sync_period: Duration,
    /// Delete managed objects with no source record (`VK_DELETE_OLD`)
    pub delete_orphans: bool,
    /// Log unrecognized kind listings at WARN (`VK_WARN_UNKNOWN_KINDS`)
    pub warn_on_unknown_kinds: bool,
    /// Ownership label value and field manager (`VK_MANAGER_NAME`)
    pub manager_name: String,
    /// Terminate the process when a pass fails (`EXIT_ON_PASS_ERROR`)
    pub exit_on_pass_error: bool,
    pub vault: VaultConfig,
    /// Metrics and probe server port (`METRICS_PORT`)
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl SyncConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the root path is missing or the sync
    /// period is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    /// See [`SyncConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root_path = lookup("VK_VAULT_ROOT_MOUNT_PATH")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("VK_VAULT_ROOT_MOUNT_PATH"))?;

        let sync_period = parse_sync_period(lookup("VK_SYNC_PERIOD").as_deref())?;

        let mut vault = VaultConfig::new(
            lookup("VAULT_ADDR").unwrap_or_else(|| DEFAULT_VAULT_ADDR.to_string()),
        );
        vault.token = lookup("VAULT_TOKEN").filter(|v| !v.is_empty());
        vault.namespace = lookup("VAULT_NAMESPACE").filter(|v| !v.is_empty());
        vault.timeout = Duration::from_secs(or_default(
            lookup("VAULT_TIMEOUT_SECS"),
            DEFAULT_VAULT_TIMEOUT_SECS,
        ));

        Ok(Self {
            root_path,
            sync_period,
            delete_orphans: delete_old_enabled(lookup("VK_DELETE_OLD").as_deref()),
            warn_on_unknown_kinds: or_default_bool(lookup("VK_WARN_UNKNOWN_KINDS"), false),
            manager_name: lookup("VK_MANAGER_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_MANAGER_NAME.to_string()),
            exit_on_pass_error: or_default_bool(lookup("EXIT_ON_PASS_ERROR"), false),
            vault,
            metrics_port: or_default(lookup("METRICS_PORT"), DEFAULT_METRICS_PORT),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "json".to_string()),
        })
    }
}

/// Unset means the default; anything else must be a positive integer
fn parse_sync_period(value: Option<&str>) -> Result<Duration, ConfigError> {
    let Some(raw) = value.filter(|v| !v.is_empty()) else {
        return Ok(Duration::from_secs(DEFAULT_SYNC_PERIOD_SECS));
    };

    let invalid = |reason: String| ConfigError::Invalid {
        key: "VK_SYNC_PERIOD",
        value: raw.to_string(),
        reason,
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero".to_string())),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(invalid(e.to_string())),
    }
}

/// Orphan deletion is on when unset, empty, or `true`; any other value turns it off
fn delete_old_enabled(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v.eq_ignore_ascii_case("true"),
    }
}

/// Parse a value or fall back to the default
fn or_default<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parse a boolean or fall back to the default
fn or_default_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SyncConfig, ConfigError> {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SyncConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_missing_root_path_is_fatal() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("VK_VAULT_ROOT_MOUNT_PATH")
        );
        assert_eq!(
            load(&[("VK_VAULT_ROOT_MOUNT_PATH", "")]).unwrap_err(),
            ConfigError::Missing("VK_VAULT_ROOT_MOUNT_PATH")
        );
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("VK_VAULT_ROOT_MOUNT_PATH", "secret/apps")]).unwrap();

        assert_eq!(config.root_path, "secret/apps");
        assert_eq!(config.sync_period, Duration::from_secs(300));
        assert!(config.delete_orphans);
        assert!(!config.warn_on_unknown_kinds);
        assert!(!config.exit_on_pass_error);
        assert_eq!(config.manager_name, "vault-sync-controller");
        assert_eq!(config.vault.address, DEFAULT_VAULT_ADDR);
        assert_eq!(config.vault.token, None);
        assert_eq!(config.vault.timeout, Duration::from_secs(30));
        assert_eq!(config.metrics_port, 5000);
    }

    #[test]
    fn test_sync_period_parsing() {
        let config = load(&[
            ("VK_VAULT_ROOT_MOUNT_PATH", "secret/apps"),
            ("VK_SYNC_PERIOD", "60"),
        ])
        .unwrap();
        assert_eq!(config.sync_period, Duration::from_secs(60));

        let err = load(&[
            ("VK_VAULT_ROOT_MOUNT_PATH", "secret/apps"),
            ("VK_SYNC_PERIOD", "five"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "VK_SYNC_PERIOD", .. }));

        let err = load(&[
            ("VK_VAULT_ROOT_MOUNT_PATH", "secret/apps"),
            ("VK_SYNC_PERIOD", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_delete_old_toggle() {
        assert!(delete_old_enabled(None));
        assert!(delete_old_enabled(Some("")));
        assert!(delete_old_enabled(Some("true")));
        assert!(delete_old_enabled(Some("TRUE")));
        assert!(!delete_old_enabled(Some("false")));
        assert!(!delete_old_enabled(Some("no")));
        assert!(!delete_old_enabled(Some("0")));
    }

    #[test]
    fn test_vault_settings() {
        let config = load(&[
            ("VK_VAULT_ROOT_MOUNT_PATH", "secret/apps"),
            ("VAULT_ADDR", "http://vault:8200"),
            ("VAULT_TOKEN", "s.token"),
            ("VAULT_NAMESPACE", "team"),
            ("VAULT_TIMEOUT_SECS", "5"),
            ("VK_WARN_UNKNOWN_KINDS", "yes"),
        ])
        .unwrap();

        assert_eq!(config.vault.address, "http://vault:8200");
        assert_eq!(config.vault.token.as_deref(), Some("s.token"));
        assert_eq!(config.vault.namespace.as_deref(), Some("team"));
        assert_eq!(config.vault.timeout, Duration::from_secs(5));
        assert!(config.warn_on_unknown_kinds);
    }
}
