//! Typed cell values
//!
//! Table cells are dynamically typed. Every cell read from a [`crate::Sheet`]
//! is one of the variants below, and every coercion between them is total.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cell of the master table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Blank cell (also what an empty string becomes after normalization)
    #[default]
    Empty,
    /// Free text, including values that failed a date or number parse
    Text(String),
    /// Finite number
    Number(f64),
    /// Calendar date
    Date(NaiveDate),
    /// Instant, used for creation timestamps
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    /// Build a number cell; non-finite values become `Empty`
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            CellValue::Number(value)
        } else {
            CellValue::Empty
        }
    }

    /// Build a number cell from an optional value (`None` → `Empty`)
    pub fn from_option(value: Option<f64>) -> Self {
        value.map(Self::number).unwrap_or(CellValue::Empty)
    }

    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// True for `Empty` and for text that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the cell: numbers as-is, numeric text parsed,
    /// everything else (blank, non-numeric, dates, non-finite) is `0`
    pub fn to_number_or_zero(&self) -> f64 {
        match self {
            CellValue::Number(n) if n.is_finite() => *n,
            CellValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// JSON rendering used in outbound payloads
    ///
    /// `Empty` and non-finite numbers render as `null`; dates as ISO strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Empty => serde_json::Value::Null,
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            CellValue::Timestamp(t) => serde_json::Value::String(crate::time::to_iso(t)),
        }
    }

    /// Inverse of [`CellValue::to_json`] for scalar JSON values posted by adapters
    ///
    /// Strings stay text (the normalizer decides what is a date); booleans
    /// become text; arrays and objects are rejected.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(CellValue::Empty),
            serde_json::Value::String(s) => Some(CellValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::number),
            serde_json::Value::Bool(b) => Some(CellValue::Text(b.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Timestamp(t) => write!(f, "{}", crate::time::to_iso(t)),
        }
    }
}
