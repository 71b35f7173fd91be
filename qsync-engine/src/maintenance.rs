//! Maintenance operations on the master table
//!
//! Manual resync of one row or the whole table, non-destructive schema
//! upgrade, and KPI backfill without dispatch.

use crate::bulk::BulkJob;
use crate::error::PipelineResult;
use crate::identity;
use crate::normalizer;
use crate::reconcile::Reconciler;
use chrono::{DateTime, Utc};
use qsync_common::schema::{self, KPI_INPUT_COLUMNS};
use qsync_common::sheet::FIRST_DATA_ROW;
use qsync_common::{time, Sheet};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Result of [`upgrade_schema`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaReport {
    /// Header count before the upgrade
    pub before: usize,
    /// Columns appended, in canonical order
    pub added: Vec<String>,
    /// Header count after the upgrade
    pub after: usize,
    pub ids_assigned: usize,
    pub timestamps_assigned: usize,
    /// Rows whose identity backfill failed (e.g. misaligned rows)
    pub failed_rows: Vec<u32>,
}

impl fmt::Display for SchemaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Schema upgraded. Columns: {} -> {} (added {}); ids: {}, fecha_registro: {}",
            self.before,
            self.after,
            self.added.len(),
            self.ids_assigned,
            self.timestamps_assigned
        )?;
        if !self.failed_rows.is_empty() {
            write!(f, "; failed rows: {:?}", self.failed_rows)?;
        }
        Ok(())
    }
}

/// Append every missing master column, then backfill empty `id` and
/// `fecha_registro` cells
///
/// Existing columns and non-empty values are never modified. A row that
/// cannot be backfilled is recorded in the report and skipped.
pub async fn upgrade_schema(sheet: &dyn Sheet, now: DateTime<Utc>) -> PipelineResult<SchemaReport> {
    let headers = sheet.headers().await?;
    let mut report = SchemaReport {
        before: headers.len(),
        ..Default::default()
    };

    for column in schema::missing_columns(&headers) {
        sheet.append_column(column).await?;
        report.added.push(column.to_string());
    }

    let headers = sheet.headers().await?;
    report.after = headers.len();
    if !report.added.is_empty() {
        info!(added = ?report.added, "Appended master columns");
    }

    let last_row = sheet.last_row().await?;
    for row in FIRST_DATA_ROW..=last_row {
        match backfill_row_identity(sheet, &headers, row, now).await {
            Ok(assignment) => {
                report.ids_assigned += usize::from(assignment.id.is_some());
                report.timestamps_assigned += usize::from(assignment.fecha_registro.is_some());
            }
            Err(err) => {
                warn!(row, error = %err, "Identity backfill skipped");
                report.failed_rows.push(row);
            }
        }
    }

    info!(
        before = report.before,
        after = report.after,
        ids = report.ids_assigned,
        timestamps = report.timestamps_assigned,
        "Schema upgrade finished"
    );
    Ok(report)
}

async fn backfill_row_identity(
    sheet: &dyn Sheet,
    headers: &[String],
    row: u32,
    now: DateTime<Utc>,
) -> PipelineResult<identity::Assignment> {
    let values = sheet.read_row(row).await?;
    let mut normalized = normalizer::normalize(headers, values)?;
    identity::assign(sheet, row, &mut normalized.record, now).await
}

/// Result of [`backfill_kpis`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiBackfillReport {
    pub updated: usize,
    pub failed: usize,
    /// KPI input columns absent from the table; they read as 0
    pub missing_inputs: Vec<String>,
}

impl fmt::Display for KpiBackfillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KPIs recomputed. OK: {} / ERR: {}", self.updated, self.failed)?;
        if !self.missing_inputs.is_empty() {
            write!(f, " (missing columns: {})", self.missing_inputs.join(", "))?;
        }
        Ok(())
    }
}

/// Recompute and write KPI columns for every row; nothing is dispatched
pub async fn backfill_kpis(reconciler: &Reconciler) -> PipelineResult<KpiBackfillReport> {
    let sheet = reconciler.sheet();
    let headers = sheet.headers().await?;
    let mut report = KpiBackfillReport {
        missing_inputs: KPI_INPUT_COLUMNS
            .iter()
            .filter(|c| !headers.iter().any(|h| schema::norm_header(h) == **c))
            .map(|c| c.to_string())
            .collect(),
        ..Default::default()
    };
    if !report.missing_inputs.is_empty() {
        warn!(missing = ?report.missing_inputs, "KPI input columns missing; they count as 0");
    }

    let last_row = sheet.last_row().await?;
    for row in FIRST_DATA_ROW..=last_row {
        match reconciler.recompute_kpis(row).await {
            Ok(_) => report.updated += 1,
            Err(err) => {
                warn!(row, error = %err, "KPI backfill skipped row");
                report.failed += 1;
            }
        }
    }

    info!(updated = report.updated, failed = report.failed, "KPI backfill finished");
    Ok(report)
}

/// Full pipeline for one row, summarized for a human
pub async fn resync_row(reconciler: &Reconciler, row: u32) -> String {
    if row < FIRST_DATA_ROW {
        return format!("Select a valid row (>= {})", FIRST_DATA_ROW);
    }

    match reconciler.run_isolated(row, time::now()).await {
        Ok(run) if run.report.succeeded() => {
            info!(row, "Manual resync succeeded");
            "Resync OK".to_string()
        }
        Ok(run) => {
            let detail = run.report.detail();
            warn!(row, detail = %detail, "SYNC ERROR");
            format!("Error: {}", detail)
        }
        Err(err) => {
            warn!(row, error = %err, "Manual resync failed");
            format!("Error: {}", err)
        }
    }
}

/// The bulk job, summarized for a human
pub async fn resync_all(reconciler: &Reconciler) -> String {
    match BulkJob::new(reconciler.clone()).run().await {
        Ok(summary) => summary.to_string(),
        Err(err) => format!("Error: {}", err),
    }
}
