//! Identity & Timestamp Assigner
//!
//! Gives every record a stable id and an immutable creation timestamp.
//! `id` and `fecha_registro` are the only fields touched here, and a
//! non-empty value is never overwritten. Each assigned value is written
//! back to the originating row in the same pass.

use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, Utc};
use qsync_common::schema::columns;
use qsync_common::{uuid_utils, CellValue, Record, Sheet};
use tracing::{debug, warn};

/// Fields assigned during one pass (`None` = already present)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    pub id: Option<String>,
    pub fecha_registro: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.fecha_registro.is_none()
    }
}

/// Fill missing identity fields on the in-memory record
///
/// Requires an `id` column: without one the id could not be persisted and
/// would change on every run. A missing `fecha_registro` column only skips
/// the timestamp.
pub fn plan(record: &mut Record, now: DateTime<Utc>) -> PipelineResult<Assignment> {
    if !record.has_column(columns::ID) {
        return Err(PipelineError::MissingColumn(columns::ID.to_string()));
    }

    let mut assignment = Assignment::default();

    if record.id().is_none() {
        let id = uuid_utils::generate_id();
        record.set(columns::ID, CellValue::text(id.clone()));
        assignment.id = Some(id);
    }

    if record.has_column(columns::FECHA_REGISTRO) {
        let blank = record
            .get(columns::FECHA_REGISTRO)
            .map(CellValue::is_blank)
            .unwrap_or(true);
        if blank {
            record.set(columns::FECHA_REGISTRO, CellValue::Timestamp(now));
            assignment.fecha_registro = Some(now);
        }
    } else {
        warn!("Table has no '{}' column; creation timestamp not recorded", columns::FECHA_REGISTRO);
    }

    Ok(assignment)
}

/// Fill missing identity fields and persist each assigned one to `row`
pub async fn assign(
    sheet: &dyn Sheet,
    row: u32,
    record: &mut Record,
    now: DateTime<Utc>,
) -> PipelineResult<Assignment> {
    let assignment = plan(record, now)?;

    if let Some(id) = &assignment.id {
        sheet.write_cell(row, columns::ID, CellValue::text(id.clone())).await?;
        debug!(row, id = %id, "Assigned record id");
    }
    if let Some(instant) = assignment.fecha_registro {
        sheet
            .write_cell(row, columns::FECHA_REGISTRO, CellValue::Timestamp(instant))
            .await?;
        debug!(row, "Assigned creation timestamp");
    }

    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use qsync_common::sheet::MemorySheet;

    fn record(headers: &[&str], values: Vec<CellValue>) -> Record {
        let headers: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
        Record::from_row(&headers, values).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_plan_fills_blank_fields() {
        let mut r = record(&["id", "fecha_registro"], vec![CellValue::Empty, CellValue::Empty]);
        let assignment = plan(&mut r, fixed_now()).unwrap();
        let id = assignment.id.clone().unwrap();
        assert!(uuid_utils::is_v4_shape(&id));
        assert_eq!(r.id(), Some(id));
        assert_eq!(r.get("fecha_registro"), Some(&CellValue::Timestamp(fixed_now())));
        assert_eq!(assignment.fecha_registro, Some(fixed_now()));
    }

    #[test]
    fn test_plan_is_idempotent() {
        let mut r = record(&["id", "fecha_registro"], vec![CellValue::Empty, CellValue::Empty]);
        plan(&mut r, fixed_now()).unwrap();
        let first = r.clone();

        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let second = plan(&mut r, later).unwrap();
        assert!(second.is_empty());
        assert_eq!(r, first);
    }

    #[test]
    fn test_whitespace_id_counts_as_missing() {
        let mut r = record(&["id"], vec![CellValue::text("  ")]);
        assert!(plan(&mut r, fixed_now()).unwrap().id.is_some());
    }

    #[test]
    fn test_missing_id_column_is_an_error() {
        let mut r = record(&["fecha_registro"], vec![CellValue::Empty]);
        assert!(matches!(plan(&mut r, fixed_now()), Err(PipelineError::MissingColumn(c)) if c == "id"));
    }

    #[test]
    fn test_missing_timestamp_column_skips_timestamp() {
        let mut r = record(&["id"], vec![CellValue::Empty]);
        let assignment = plan(&mut r, fixed_now()).unwrap();
        assert!(assignment.fecha_registro.is_none());
        assert!(!r.has_column("fecha_registro"));
    }

    #[tokio::test]
    async fn test_assign_writes_back_only_assigned_fields() {
        let sheet = MemorySheet::new("m", &["id", "fecha_registro"])
            .with_row(vec![CellValue::text("keep-me"), CellValue::Empty]);
        let mut r = record(&["id", "fecha_registro"], sheet.read_row(2).await.unwrap());

        let assignment = assign(&sheet, 2, &mut r, fixed_now()).await.unwrap();

        assert!(assignment.id.is_none());
        assert_eq!(
            sheet.writes(),
            vec![(2, "fecha_registro".to_string(), CellValue::Timestamp(fixed_now()))]
        );
        assert_eq!(sheet.cell(2, "id"), Some(CellValue::text("keep-me")));
    }
}
