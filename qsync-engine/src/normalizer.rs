//! Value Normalizer
//!
//! Converts a raw row (header list + cell values) into a typed [`Record`]:
//! - date-like columns are parsed to calendar dates
//! - known financial columns and `probabilidad` are coerced to numbers
//! - empty strings become [`CellValue::Empty`]
//!
//! Pure transform. A date that does not parse fails only its column: the
//! original value is kept and a [`ColumnIssue`] is reported.

use crate::error::{PipelineError, PipelineResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use qsync_common::schema::{self, columns};
use qsync_common::{CellValue, Record};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// A column that could not be normalized; the rest of the row still was
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnIssue {
    pub column: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: Record,
    pub issues: Vec<ColumnIssue>,
}

/// Normalize one row
///
/// Fails only when `headers` and `values` are misaligned.
pub fn normalize(headers: &[String], values: Vec<CellValue>) -> PipelineResult<Normalized> {
    if headers.len() != values.len() {
        return Err(PipelineError::SchemaMismatch {
            headers: headers.len(),
            values: values.len(),
        });
    }

    let mut issues = Vec::new();
    let normalized: Vec<CellValue> = headers
        .iter()
        .zip(values)
        .map(|(header, value)| {
            let value = empty_string_to_empty(value);
            if schema::is_numeric_column(header) || header == columns::PROBABILIDAD {
                CellValue::Number(value.to_number_or_zero())
            } else if schema::is_date_column(header) {
                match normalize_date(value) {
                    Ok(v) => v,
                    Err(original) => {
                        issues.push(ColumnIssue {
                            column: header.clone(),
                            reason: format!("unparsable date '{}'", original),
                        });
                        original
                    }
                }
            } else {
                value
            }
        })
        .collect();

    let record = Record::from_row(headers, normalized)?;
    for issue in &issues {
        tracing::debug!(column = %issue.column, reason = %issue.reason, "Column left unnormalized");
    }
    Ok(Normalized { record, issues })
}

fn empty_string_to_empty(value: CellValue) -> CellValue {
    match value {
        CellValue::Text(s) if s.is_empty() => CellValue::Empty,
        other => other,
    }
}

/// Parse a date-like cell; `Err` carries the untouched original
fn normalize_date(value: CellValue) -> Result<CellValue, CellValue> {
    match value {
        CellValue::Empty | CellValue::Date(_) | CellValue::Timestamp(_) => Ok(value),
        CellValue::Text(text) => match parse_date_text(text.trim()) {
            Some(parsed) => Ok(parsed),
            None => Err(CellValue::Text(text)),
        },
        CellValue::Number(_) => Err(value),
    }
}

/// Accepted date text: ISO date, slash/dash day-first dates, naive
/// date-times (date part kept) and RFC 3339 instants (kept as timestamps)
pub fn parse_date_text(text: &str) -> Option<CellValue> {
    if text.is_empty() {
        return Some(CellValue::Empty);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(CellValue::Timestamp(instant.with_timezone(&Utc)));
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(CellValue::Date(date));
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(CellValue::Date(dt.date()));
        }
    }
    None
}
