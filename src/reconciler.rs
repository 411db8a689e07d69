//! # Reconciler
//!
//! One reconciliation pass: discover every record in Vault, mirror the
//! managed ones into the target store, then remove orphans.
//!
//! ## Reconciliation Flow
//!
//! 1. Walk the configured root. A discovery failure aborts the pass before
//!    any write, so partial trees never reach the target.
//! 2. For each record, in walker order, ask the target whether the object is
//!    managed. Unmanaged objects are skipped.
//! 3. Upsert managed records by kind. A failed write is logged and counted;
//!    the remaining records are still processed.
//! 4. When enabled, hand the complete record set (managed or not) to the
//!    target for orphan deletion, exactly once and strictly after every
//!    upsert. A failure here fails the pass.
//!
//! Passes carry no state between runs. The controller assumes it is the only
//! reconciler writing to its target scope.

use crate::observability::metrics;
use crate::record::{RecordKey, RecordKind, SecretRecord};
use crate::source::{StoreError, TreeWalker};
use crate::target::{TargetError, TargetStoreClient};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Walking Vault failed; nothing was written
    #[error("Discovery failed: {0}")]
    Discovery(#[from] StoreError),

    /// Upserts were attempted but orphan deletion failed
    #[error("Orphan cleanup failed: {0}")]
    OrphanCleanup(#[source] TargetError),
}

/// Whether orphan deletion ran during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanCleanup {
    Ran,
    #[default]
    Disabled,
}

/// Outcome of a successful pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub discovered: usize,
    pub upserted: usize,
    pub skipped_unmanaged: usize,
    /// Records whose write failed, in processing order
    pub write_failures: Vec<RecordKey>,
    pub orphan_cleanup: OrphanCleanup,
}

/// Drives a single reconciliation pass
#[derive(Clone)]
pub struct ReconcileDriver {
    walker: TreeWalker,
    target: Arc<dyn TargetStoreClient>,
    root_path: String,
    delete_orphans: bool,
}

impl std::fmt::Debug for ReconcileDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileDriver")
            .field("walker", &self.walker)
            .field("root_path", &self.root_path)
            .field("delete_orphans", &self.delete_orphans)
            .finish_non_exhaustive()
    }
}

impl ReconcileDriver {
    pub fn new(
        walker: TreeWalker,
        target: Arc<dyn TargetStoreClient>,
        root_path: impl Into<String>,
        delete_orphans: bool,
    ) -> Self {
        Self {
            walker,
            target,
            root_path: root_path.into(),
            delete_orphans,
        }
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Run one pass
    ///
    /// # Errors
    /// Returns [`ReconcilerError::Discovery`] if Vault could not be walked and
    /// [`ReconcilerError::OrphanCleanup`] if orphan deletion is enabled and
    /// fails. Individual write failures are reported in the summary instead.
    pub async fn reconcile(&self) -> Result<PassSummary, ReconcilerError> {
        let records = self.walker.walk(&self.root_path).await?;
        metrics::set_records_discovered(records.len());

        let mut summary = PassSummary {
            discovered: records.len(),
            ..PassSummary::default()
        };

        for record in &records {
            self.sync_record(record, &mut summary).await;
        }

        if self.delete_orphans {
            self.target
                .delete_unreferenced(&records)
                .await
                .map_err(ReconcilerError::OrphanCleanup)?;
            summary.orphan_cleanup = OrphanCleanup::Ran;
        }

        Ok(summary)
    }

    async fn sync_record(&self, record: &SecretRecord, summary: &mut PassSummary) {
        let SecretRecord {
            name,
            namespace,
            kind,
            pairs,
        } = record;

        if !self.target.is_managed(name, *kind, namespace).await {
            info!(%kind, namespace = %namespace, name = %name, "Object is not managed by this controller, ignoring");
            metrics::increment_unmanaged_skipped(*kind);
            summary.skipped_unmanaged += 1;
            return;
        }

        let result = match kind {
            RecordKind::Secret => self.target.upsert_secret(name, namespace, pairs).await,
            RecordKind::Config => self.target.upsert_config(name, namespace, pairs).await,
        };

        match result {
            Ok(()) => {
                info!(%kind, namespace = %namespace, name = %name, "Synced object");
                metrics::increment_upserts(*kind);
                summary.upserted += 1;
            }
            Err(e) => {
                error!(%kind, namespace = %namespace, name = %name, error = %e, "Failed to sync object");
                metrics::increment_upsert_errors(*kind);
                summary.write_failures.push(record.key());
            }
        }
    }
}
