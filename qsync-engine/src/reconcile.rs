//! Per-row pipeline shared by the trigger controller, the bulk job and the
//! maintenance commands
//!
//! Normalizer → Identity Assigner → KPI Calculator → write-back → Dispatcher.
//! Every run re-reads the row's current state from the table; nothing is
//! taken from the event that started it.

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::{PipelineError, PipelineResult};
use crate::identity::{self, Assignment};
use crate::kpi::{self, KpiInputs, Kpis};
use crate::normalizer::{self, ColumnIssue};
use chrono::{DateTime, Utc};
use qsync_common::{Record, Sheet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Outcome of a full pipeline run for one row
#[derive(Debug, Clone)]
pub struct RowRun {
    pub row: u32,
    pub assignment: Assignment,
    pub kpis: Kpis,
    pub report: DispatchReport,
    pub issues: Vec<ColumnIssue>,
}

#[derive(Clone)]
pub struct Reconciler {
    sheet: Arc<dyn Sheet>,
    dispatcher: Arc<Dispatcher>,
}

impl Reconciler {
    pub fn new(sheet: Arc<dyn Sheet>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { sheet, dispatcher }
    }

    pub fn sheet(&self) -> &dyn Sheet {
        self.sheet.as_ref()
    }

    /// Read and normalize the current state of `row`
    async fn load(&self, row: u32) -> PipelineResult<normalizer::Normalized> {
        let headers = self.sheet.headers().await?;
        let values = self.sheet.read_row(row).await?;
        normalizer::normalize(&headers, values)
    }

    /// Normalize + assign identity; no KPI work, no dispatch
    pub async fn backfill_identity(&self, row: u32, now: DateTime<Utc>) -> PipelineResult<Assignment> {
        let mut normalized = self.load(row).await?;
        identity::assign(self.sheet.as_ref(), row, &mut normalized.record, now).await
    }

    /// Recompute KPIs and write them back; no identity assignment, no dispatch
    pub async fn recompute_kpis(&self, row: u32) -> PipelineResult<Kpis> {
        let mut normalized = self.load(row).await?;
        self.write_kpis(row, &mut normalized.record).await
    }

    /// Full pipeline for one row
    pub async fn run(&self, row: u32, now: DateTime<Utc>) -> PipelineResult<RowRun> {
        let normalized = self.load(row).await?;
        let mut record = normalized.record;

        let assignment = identity::assign(self.sheet.as_ref(), row, &mut record, now).await?;
        let kpis = self.write_kpis(row, &mut record).await?;
        let report = self.dispatcher.dispatch(&record).await;

        Ok(RowRun {
            row,
            assignment,
            kpis,
            report,
            issues: normalized.issues,
        })
    }

    /// Full pipeline inside its own task, so a panic is reported as
    /// [`PipelineError::Unexpected`] instead of unwinding into the caller
    pub async fn run_isolated(&self, row: u32, now: DateTime<Utc>) -> PipelineResult<RowRun> {
        let this = self.clone();
        join_row(row, tokio::spawn(async move { this.run(row, now).await })).await
    }

    /// [`Reconciler::backfill_identity`] inside its own task
    pub async fn backfill_identity_isolated(
        &self,
        row: u32,
        now: DateTime<Utc>,
    ) -> PipelineResult<Assignment> {
        let this = self.clone();
        join_row(row, tokio::spawn(async move { this.backfill_identity(row, now).await })).await
    }

    /// Compute all four KPIs from the record's current inputs and write every
    /// KPI column the table has; the record is updated to match
    async fn write_kpis(&self, row: u32, record: &mut Record) -> PipelineResult<Kpis> {
        let kpis = kpi::compute(&KpiInputs::from_record(record));
        for (column, value) in kpis.cells() {
            if record.has_column(column) {
                self.sheet.write_cell(row, column, value.clone()).await?;
                record.set(column, value);
            }
        }
        debug!(row, cpi = ?kpis.cpi, spi = ?kpis.spi, eac = ?kpis.eac, etc = ?kpis.etc, "KPIs written");
        Ok(kpis)
    }
}

async fn join_row<T>(row: u32, task: JoinHandle<PipelineResult<T>>) -> PipelineResult<T> {
    task.await
        .map_err(|e| PipelineError::Unexpected(format!("row {} task failed: {}", row, e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use qsync_common::sheet::MemorySheet;
    use qsync_common::{uuid_utils, CellValue};

    const HEADERS: [&str; 9] = [
        "id",
        "fecha_registro",
        "Cliente",
        "costo_presupuestado",
        "acumulado_coste_real",
        "acumulado_avance_valorizado",
        "cpi",
        "spi",
        "eac",
    ];

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sheet() -> Arc<MemorySheet> {
        Arc::new(MemorySheet::new("Cotizaciones_Master", &HEADERS).with_row(vec![
            CellValue::Empty,
            CellValue::Empty,
            CellValue::text("ACME"),
            CellValue::text("100000"),
            CellValue::text("40000"),
            CellValue::text("50000"),
            CellValue::Empty,
            CellValue::Empty,
            CellValue::Empty,
        ]))
    }

    #[tokio::test]
    async fn test_run_assigns_computes_and_writes_back() {
        let sheet = sheet();
        let reconciler = Reconciler::new(sheet.clone(), Arc::new(Dispatcher::new(Vec::new())));

        let run = reconciler.run(2, now()).await.unwrap();

        assert!(run.report.succeeded());
        assert_eq!(run.kpis.cpi, Some(1.25));
        assert!(uuid_utils::is_v4_shape(run.assignment.id.as_deref().unwrap()));
        assert_eq!(sheet.cell(2, "cpi"), Some(CellValue::Number(1.25)));
        assert_eq!(sheet.cell(2, "spi"), Some(CellValue::Number(0.5)));
        assert_eq!(sheet.cell(2, "eac"), Some(CellValue::Number(80000.0)));
        assert_eq!(sheet.cell(2, "fecha_registro"), Some(CellValue::Timestamp(now())));
        // No `etc` column: nothing written for it
        assert!(sheet.writes().iter().all(|(_, col, _)| col != "etc"));
    }

    #[tokio::test]
    async fn test_recompute_kpis_does_not_assign_identity() {
        let sheet = sheet();
        let reconciler = Reconciler::new(sheet.clone(), Arc::new(Dispatcher::new(Vec::new())));

        reconciler.recompute_kpis(2).await.unwrap();

        assert_eq!(sheet.cell(2, "id"), Some(CellValue::Empty));
        assert_eq!(sheet.cell(2, "cpi"), Some(CellValue::Number(1.25)));
    }

    #[tokio::test]
    async fn test_backfill_identity_writes_only_identity_columns() {
        let sheet = sheet();
        let reconciler = Reconciler::new(sheet.clone(), Arc::new(Dispatcher::new(Vec::new())));

        let assignment = reconciler.backfill_identity(2, now()).await.unwrap();

        assert!(assignment.id.is_some());
        let written: Vec<String> = sheet.writes().into_iter().map(|(_, c, _)| c).collect();
        assert_eq!(written, vec!["id", "fecha_registro"]);
    }

    #[tokio::test]
    async fn test_rerun_rereads_current_state() {
        let sheet = sheet();
        let reconciler = Reconciler::new(sheet.clone(), Arc::new(Dispatcher::new(Vec::new())));
        reconciler.run(2, now()).await.unwrap();
        let id = sheet.cell(2, "id");

        sheet
            .write_cell(2, "acumulado_coste_real", CellValue::Number(50000.0))
            .await
            .unwrap();
        let run = reconciler.run(2, now()).await.unwrap();

        assert_eq!(run.kpis.cpi, Some(1.0));
        assert!(run.assignment.is_empty());
        assert_eq!(sheet.cell(2, "id"), id);
    }
}
