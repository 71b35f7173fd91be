//! Change Trigger Controller
//!
//! Handles one [`RowChanged`] message at a time:
//! 1. ignore the header row and tables other than the master table
//! 2. ignore edits to derived/identity columns; the pipeline writes those
//!    itself, and reacting to them would re-trigger it without end
//! 3. KPI-input edits run the full pipeline (identity, KPIs, write-back,
//!    dispatch)
//! 4. other edits only backfill identity, unless `sync_on_any_edit` is set
//!
//! The handler never returns an error: failures are logged and reported as
//! [`TriggerOutcome::Failed`].
//!
//! [`TriggerController::apply_edit`] is the adapter path for hosts that send
//! the new value along with the event: the cell is written first, then the
//! edit is handled like any other.

use crate::dispatch::DispatchReport;
use crate::error::{PipelineError, PipelineResult};
use crate::identity::Assignment;
use crate::kpi::Kpis;
use crate::reconcile::Reconciler;
use qsync_common::schema;
use qsync_common::sheet::FIRST_DATA_ROW;
use qsync_common::{time, CellValue, PrimaryTable, RowChanged};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    HeaderRow,
    NotPrimaryTable,
    DerivedColumn,
}

#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Ignored(IgnoreReason),
    /// Identity backfill only; no KPI recomputation and no dispatch
    Backfilled { row: u32, assignment: Assignment },
    /// Full pipeline ran; `report` is the aggregated dispatch result
    Reconciled {
        row: u32,
        assignment: Assignment,
        kpis: Kpis,
        report: DispatchReport,
    },
    Failed { row: u32, error: String },
}

#[derive(Clone)]
pub struct TriggerController {
    reconciler: Reconciler,
    primary: Arc<dyn PrimaryTable>,
    sync_on_any_edit: bool,
}

impl TriggerController {
    pub fn new(reconciler: Reconciler, primary: Arc<dyn PrimaryTable>) -> Self {
        Self {
            reconciler,
            primary,
            sync_on_any_edit: false,
        }
    }

    /// Run the full pipeline for every non-derived edit, not only KPI inputs
    pub fn with_sync_on_any_edit(mut self, enabled: bool) -> Self {
        self.sync_on_any_edit = enabled;
        self
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Handle one change event to completion
    pub async fn handle(&self, event: &RowChanged) -> TriggerOutcome {
        if let Some(reason) = self.ignore_reason(event) {
            debug!(sheet = %event.sheet, row = event.row, column = %event.column, ?reason, "Change ignored");
            return TriggerOutcome::Ignored(reason);
        }

        match self.process(event).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(row = event.row, column = %event.column, error = %err, "Change handler failed");
                TriggerOutcome::Failed {
                    row: event.row,
                    error: err.to_string(),
                }
            }
        }
    }

    /// Write `value` into the edited cell of the master table, then handle the edit
    ///
    /// Cells outside the master table's data rows are never written. Writing a
    /// derived column is allowed, but the edit itself is then ignored.
    pub async fn apply_edit(&self, event: &RowChanged, value: CellValue) -> TriggerOutcome {
        if let Some(reason) = self.outside_master(event) {
            debug!(sheet = %event.sheet, row = event.row, ?reason, "Edit not written");
            return TriggerOutcome::Ignored(reason);
        }

        let written = self
            .reconciler
            .sheet()
            .write_cell(event.row, &event.column, value)
            .await;
        if let Err(err) = written {
            let err = PipelineError::from(err);
            error!(row = event.row, column = %event.column, error = %err, "Cell write failed");
            return TriggerOutcome::Failed {
                row: event.row,
                error: err.to_string(),
            };
        }

        self.handle(event).await
    }

    fn outside_master(&self, event: &RowChanged) -> Option<IgnoreReason> {
        if event.row < FIRST_DATA_ROW {
            Some(IgnoreReason::HeaderRow)
        } else if !self.primary.is_primary(&event.sheet) {
            Some(IgnoreReason::NotPrimaryTable)
        } else {
            None
        }
    }

    fn ignore_reason(&self, event: &RowChanged) -> Option<IgnoreReason> {
        self.outside_master(event).or_else(|| {
            schema::is_derived_column(&event.column).then_some(IgnoreReason::DerivedColumn)
        })
    }

    async fn process(&self, event: &RowChanged) -> PipelineResult<TriggerOutcome> {
        let now = time::now();
        let row = event.row;

        if !self.sync_on_any_edit && !schema::is_kpi_input_column(&event.column) {
            let assignment = self.reconciler.backfill_identity_isolated(row, now).await?;
            return Ok(TriggerOutcome::Backfilled { row, assignment });
        }

        let run = self.reconciler.run_isolated(row, now).await?;
        if run.report.succeeded() {
            info!(row, column = %event.column, "Row reconciled");
        } else {
            warn!(row, column = %event.column, detail = %run.report.detail(), "SYNC ERROR");
        }
        Ok(TriggerOutcome::Reconciled {
            row,
            assignment: run.assignment,
            kpis: run.kpis,
            report: run.report,
        })
    }
}
