//! Reconciliation sweep.
//!
//! The sweep is the pull channel and the system's correctness backstop: it
//! refetches the full open-alert set and pushes every unmatched alert
//! through the same create path as the webhook `created` transition, so a
//! dropped, reordered, or too-early webhook delivery is eventually
//! corrected without manual intervention.
//!
//! The sweep runs once at process start after a configurable delay; any
//! recurring schedule is owned by an external scheduler.

use tracing::{debug, info, warn};

use crate::alert::Alert;
use crate::entry::EntryMetadata;
use crate::ledger::LedgerError;
use crate::processor::{EventProcessor, Outcome};

/// Aggregate result of one sweep run.
///
/// Counts, not details: this is an operational summary, not a transactional
/// report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Alerts fetched from the scanner.
    pub total_alerts: usize,

    /// New ledger entries created this run.
    pub created_issues: usize,

    /// Alerts skipped (not open, untracked branch, or already tracked).
    pub skipped_alerts: usize,

    /// Alerts whose processing failed; they will be retried by the next
    /// run.
    pub errors: usize,
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} issues created, {} alerts skipped, {} errors (of {} alerts)",
            self.created_issues, self.skipped_alerts, self.errors, self.total_alerts
        )
    }
}

/// Full-state diff between open alerts and ledger entries.
pub struct ReconciliationSweep {
    processor: EventProcessor,
}

impl ReconciliationSweep {
    /// Creates a sweep sharing the processor's ledger and branch policy.
    #[must_use]
    pub const fn new(processor: EventProcessor) -> Self {
        Self { processor }
    }

    /// Fetches all open alerts and reconciles each one independently.
    ///
    /// A failure processing one alert increments the error counter and
    /// never aborts the run: every alert is attempted exactly once per
    /// run.
    ///
    /// # Errors
    ///
    /// Only the initial fetch can fail the run as a whole.
    pub async fn run(&self) -> Result<SweepReport, LedgerError> {
        let alerts = self.processor.ledger().fetch_open_alerts().await?;
        info!(total = alerts.len(), "starting alert reconciliation");

        let mut report = SweepReport {
            total_alerts: alerts.len(),
            ..SweepReport::default()
        };

        for alert in &alerts {
            match self.process_alert(alert).await {
                Ok(true) => report.created_issues += 1,
                Ok(false) => report.skipped_alerts += 1,
                Err(error) => {
                    warn!(alert_id = alert.id, %error, "failed to reconcile alert");
                    report.errors += 1;
                },
            }
        }

        info!(%report, "reconciliation completed");
        Ok(report)
    }

    /// Reconciles one alert; `true` when a new entry was created.
    async fn process_alert(&self, alert: &Alert) -> Result<bool, LedgerError> {
        // The fetch should already filter to open alerts, but trust nothing.
        if !alert.state.is_open() {
            debug!(alert_id = alert.id, state = ?alert.state, "skipping non-open alert");
            return Ok(false);
        }

        match self
            .processor
            .create_tracked(EntryMetadata::from_alert(alert))
            .await?
        {
            Outcome::Created(entry) => {
                info!(
                    alert_id = alert.id,
                    entry_id = %entry.id,
                    "created entry for reconciled alert"
                );
                Ok(true)
            },
            Outcome::Existing(entry) => {
                debug!(
                    alert_id = alert.id,
                    entry_id = %entry.id,
                    "alert already tracked"
                );
                Ok(false)
            },
            Outcome::Skipped(reason) => {
                debug!(alert_id = alert.id, %reason, "alert skipped");
                Ok(false)
            },
            // create_tracked never updates, but the match must be total.
            Outcome::Updated(_) => Ok(false),
        }
    }
}
