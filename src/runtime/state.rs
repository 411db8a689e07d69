//! # Pass State
//!
//! Outcome of recent passes, shared between the scheduler and the probe
//! server. The controller is ready once a pass has completed without a
//! discovery or cleanup failure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

const NEVER: i64 = i64::MIN;

/// Counters updated after every pass
#[derive(Debug)]
pub struct PassState {
    passes: AtomicU64,
    failed_passes: AtomicU64,
    last_pass_ok: AtomicBool,
    last_write_failures: AtomicU64,
    /// Unix seconds of the last successful pass, [`NEVER`] until one completes
    last_success: AtomicI64,
}

impl Default for PassState {
    fn default() -> Self {
        Self {
            passes: AtomicU64::new(0),
            failed_passes: AtomicU64::new(0),
            last_pass_ok: AtomicBool::new(false),
            last_write_failures: AtomicU64::new(0),
            last_success: AtomicI64::new(NEVER),
        }
    }
}

/// Point-in-time view served on `/readyz`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSnapshot {
    pub ready: bool,
    pub passes: u64,
    pub failed_passes: u64,
    pub last_pass_ok: bool,
    /// Records whose write failed during the last successful pass
    pub last_write_failures: u64,
    /// RFC 3339 time of the last successful pass
    pub last_success: Option<String>,
}

impl PassState {
    /// Record a pass that discovered and cleaned up without error
    pub fn record_success(&self, at: DateTime<Utc>, write_failures: usize) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.last_write_failures.store(
            u64::try_from(write_failures).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
        self.last_success.store(at.timestamp(), Ordering::Relaxed);
        self.last_pass_ok.store(true, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.failed_passes.fetch_add(1, Ordering::Relaxed);
        self.last_pass_ok.store(false, Ordering::Relaxed);
    }

    /// Ready once any pass has succeeded; a later failure does not revoke it
    pub fn is_ready(&self) -> bool {
        self.last_success.load(Ordering::Relaxed) != NEVER
    }

    pub fn snapshot(&self) -> PassSnapshot {
        let last_success = match self.last_success.load(Ordering::Relaxed) {
            NEVER => None,
            secs => DateTime::<Utc>::from_timestamp(secs, 0).map(|t| t.to_rfc3339()),
        };

        PassSnapshot {
            ready: last_success.is_some(),
            passes: self.passes.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            last_pass_ok: self.last_pass_ok.load(Ordering::Relaxed),
            last_write_failures: self.last_write_failures.load(Ordering::Relaxed),
            last_success,
        }
    }
}
