//! # Scheduler
//!
//! The single control loop: one timer, one pass per tick, never two passes
//! at once. The first pass runs immediately. Shutdown is only observed
//! between passes; an interrupted process leaves the target partially
//! converged and the next run completes it.

use crate::observability::metrics;
use super::state::PassState;
use crate::reconciler::{PassSummary, ReconcileDriver, ReconcilerError};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, info_span, warn, Instrument};

/// Runs [`ReconcileDriver::reconcile`] on a fixed interval
#[derive(Debug)]
pub struct Scheduler {
    driver: ReconcileDriver,
    period: Duration,
    exit_on_pass_error: bool,
    state: Arc<PassState>,
}

impl Scheduler {
    pub fn new(driver: ReconcileDriver, period: Duration) -> Self {
        Self {
            driver,
            period,
            exit_on_pass_error: false,
            state: Arc::new(PassState::default()),
        }
    }

    /// Stop the loop with the pass error instead of waiting for the next tick
    #[must_use]
    pub fn with_exit_on_pass_error(mut self, exit: bool) -> Self {
        self.exit_on_pass_error = exit;
        self
    }

    /// Share pass outcomes with the probe server
    #[must_use]
    pub fn with_pass_state(mut self, state: Arc<PassState>) -> Self {
        self.state = state;
        self
    }

    /// Run passes until `shutdown` resolves
    ///
    /// # Errors
    /// Returns the pass error when exit-on-error is enabled; otherwise failed
    /// passes are logged and retried on the next tick.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ReconcilerError>
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            period_secs = self.period.as_secs(),
            root_path = self.driver.root_path(),
            "Started with sync period"
        );

        let mut pass: u64 = 0;
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            pass += 1;
            match run_pass(&self.driver, pass).await {
                Ok(summary) => self
                    .state
                    .record_success(chrono::Utc::now(), summary.write_failures.len()),
                Err(e) => {
                    self.state.record_failure();
                    if self.exit_on_pass_error {
                        return Err(e);
                    }
                }
            }

            let next = chrono::Utc::now()
                + chrono::Duration::from_std(self.period).unwrap_or(chrono::Duration::zero());
            info!(next_pass = %next.to_rfc3339(), "Next pass scheduled");
        }
    }
}

/// Run one instrumented pass
///
/// # Errors
/// Propagates the [`ReconcilerError`] after logging and counting it.
pub async fn run_pass(driver: &ReconcileDriver, pass: u64) -> Result<PassSummary, ReconcilerError> {
    let span = info_span!("reconcile.pass", pass);
    async {
        let start = Instant::now();
        metrics::increment_passes();

        let result = driver.reconcile().await;
        let elapsed = start.elapsed();
        metrics::observe_pass_duration(elapsed.as_secs_f64());

        match &result {
            Ok(summary) => {
                if summary.write_failures.is_empty() {
                    info!(
                        discovered = summary.discovered,
                        upserted = summary.upserted,
                        skipped_unmanaged = summary.skipped_unmanaged,
                        orphan_cleanup = ?summary.orphan_cleanup,
                        duration_ms = elapsed.as_millis(),
                        "Pass completed"
                    );
                } else {
                    warn!(
                        discovered = summary.discovered,
                        upserted = summary.upserted,
                        skipped_unmanaged = summary.skipped_unmanaged,
                        write_failures = summary.write_failures.len(),
                        orphan_cleanup = ?summary.orphan_cleanup,
                        duration_ms = elapsed.as_millis(),
                        "Pass completed with write failures"
                    );
                }
            }
            Err(e) => {
                metrics::increment_pass_errors();
                error!(error = %e, duration_ms = elapsed.as_millis(), "Pass failed");
            }
        }

        result
    }
    .instrument(span)
    .await
}

/// Resolves on SIGINT, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
