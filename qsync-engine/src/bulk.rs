//! Bulk Reconciliation Job
//!
//! Runs the full pipeline over every data row, one row at a time. Each row
//! runs in its own task: an error or panic is counted against that row and
//! the job moves on to the next one.

use crate::error::PipelineResult;
use crate::reconcile::Reconciler;
use qsync_common::sheet::FIRST_DATA_ROW;
use qsync_common::time;
use std::fmt;
use tracing::{error, info, warn};

/// Aggregate counts of a bulk run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for BulkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resync finished. OK: {} / ERR: {}", self.succeeded, self.failed)
    }
}

pub struct BulkJob {
    reconciler: Reconciler,
}

impl BulkJob {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// Reconcile and dispatch every data row
    ///
    /// A row counts as succeeded only when its pipeline completed and every
    /// target accepted the record. Only a failure to read the table's extent
    /// is returned as an error.
    pub async fn run(&self) -> PipelineResult<BulkSummary> {
        let last_row = self.reconciler.sheet().last_row().await?;
        let mut summary = BulkSummary::default();

        info!(rows = last_row.saturating_sub(FIRST_DATA_ROW - 1), "Bulk resync started");

        for row in FIRST_DATA_ROW..=last_row {
            match self.reconciler.run_isolated(row, time::now()).await {
                Ok(run) if run.report.succeeded() => summary.succeeded += 1,
                Ok(run) => {
                    warn!(row, detail = %run.report.detail(), "SYNC ERROR");
                    summary.failed += 1;
                }
                Err(err) => {
                    error!(row, error = %err, "Row failed during bulk resync");
                    summary.failed += 1;
                }
            }
        }

        info!(succeeded = summary.succeeded, failed = summary.failed, "Bulk resync finished");
        Ok(summary)
    }
}
