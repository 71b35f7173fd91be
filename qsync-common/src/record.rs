//! Record: one master-table row keyed by header
//!
//! A record is materialized per pipeline run from the persistent row and is
//! never stored on its own. Its attribute set is exactly the table's header
//! set at read time; headers the engine knows nothing about pass through.

use crate::cell::CellValue;
use crate::schema::columns;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    headers: Vec<String>,
    cells: HashMap<String, CellValue>,
}

impl Record {
    /// Build a record from aligned header and value slices
    ///
    /// Returns `Error::SchemaMismatch` when lengths differ.
    pub fn from_row(headers: &[String], values: Vec<CellValue>) -> crate::Result<Self> {
        if headers.len() != values.len() {
            return Err(crate::Error::SchemaMismatch {
                headers: headers.len(),
                values: values.len(),
            });
        }
        let cells = headers.iter().cloned().zip(values).collect();
        Ok(Self {
            headers: headers.to_vec(),
            cells,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, header: &str) -> bool {
        self.cells.contains_key(header)
    }

    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.get(header)
    }

    /// Set a cell; headers not already in the record are appended
    pub fn set(&mut self, header: &str, value: CellValue) {
        if !self.cells.contains_key(header) {
            self.headers.push(header.to_string());
        }
        self.cells.insert(header.to_string(), value);
    }

    /// Numeric view of a field (missing/blank/non-numeric → 0)
    pub fn number(&self, header: &str) -> f64 {
        self.get(header).map(CellValue::to_number_or_zero).unwrap_or(0.0)
    }

    /// Record id, if present and non-blank
    ///
    /// Returned exactly as stored: it is the key the stores match on, so it
    /// must equal the `id` field of [`Record::to_payload`].
    pub fn id(&self) -> Option<String> {
        self.get(columns::ID)
            .filter(|v| !v.is_blank())
            .map(CellValue::to_string)
    }

    /// Values in header order
    pub fn values(&self) -> Vec<CellValue> {
        self.headers
            .iter()
            .map(|h| self.cells.get(h).cloned().unwrap_or_default())
            .collect()
    }

    /// Flat key/value JSON object with every current header
    pub fn to_payload(&self) -> Map<String, Value> {
        self.headers
            .iter()
            .map(|h| {
                let value = self.cells.get(h).map(CellValue::to_json).unwrap_or(Value::Null);
                (h.clone(), value)
            })
            .collect()
    }
}
