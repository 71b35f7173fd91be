//! In-memory table
//!
//! Rows are stored exactly as given: a row whose length differs from the
//! header row is returned as-is so callers see the misalignment.

use super::{Sheet, FIRST_DATA_ROW};
use crate::cell::CellValue;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    writes: Vec<(u32, String, CellValue)>,
}

#[derive(Debug)]
pub struct MemorySheet {
    name: String,
    inner: Mutex<Inner>,
}

impl MemorySheet {
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                headers: headers.iter().map(|h| h.to_string()).collect(),
                ..Default::default()
            }),
        }
    }

    /// Builder-style row append for fixtures
    pub fn with_row(self, values: Vec<CellValue>) -> Self {
        self.lock().rows.push(values);
        self
    }

    /// Cell by header, `None` when row or column is absent
    pub fn cell(&self, row: u32, header: &str) -> Option<CellValue> {
        let inner = self.lock();
        let col = inner.headers.iter().position(|h| h == header)?;
        let idx = row.checked_sub(FIRST_DATA_ROW)? as usize;
        inner.rows.get(idx)?.get(col).cloned()
    }

    /// Every `write_cell` performed so far, in order
    pub fn writes(&self) -> Vec<(u32, String, CellValue)> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking test thread; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_index(inner: &Inner, row: u32) -> Result<usize> {
        row.checked_sub(FIRST_DATA_ROW)
            .map(|i| i as usize)
            .filter(|i| *i < inner.rows.len())
            .ok_or_else(|| Error::NotFound(format!("row {}", row)))
    }
}

#[async_trait]
impl Sheet for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn headers(&self) -> Result<Vec<String>> {
        Ok(self.lock().headers.clone())
    }

    async fn last_row(&self) -> Result<u32> {
        Ok(self.lock().rows.len() as u32 + FIRST_DATA_ROW - 1)
    }

    async fn read_row(&self, row: u32) -> Result<Vec<CellValue>> {
        let inner = self.lock();
        let idx = Self::row_index(&inner, row)?;
        Ok(inner.rows[idx].clone())
    }

    async fn write_cell(&self, row: u32, header: &str, value: CellValue) -> Result<()> {
        let mut inner = self.lock();
        let col = inner
            .headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| Error::NotFound(format!("column '{}'", header)))?;
        let idx = Self::row_index(&inner, row)?;
        let cells = &mut inner.rows[idx];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Empty);
        }
        cells[col] = value.clone();
        inner.writes.push((row, header.to_string(), value));
        Ok(())
    }

    async fn append_column(&self, header: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.headers.push(header.to_string());
        let width = inner.headers.len();
        for cells in inner.rows.iter_mut() {
            if cells.len() < width {
                cells.resize(width, CellValue::Empty);
            }
        }
        Ok(())
    }

    async fn append_row(&self, values: Vec<CellValue>) -> Result<u32> {
        let mut inner = self.lock();
        inner.rows.push(values);
        Ok(inner.rows.len() as u32 + FIRST_DATA_ROW - 1)
    }
}
