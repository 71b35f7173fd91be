//! Event messages delivered to the reconciliation engine
//!
//! The hosting environment converts its native edit notifications into
//! [`RowChanged`] and performs the cell reads/writes the handler asks for
//! through [`crate::Sheet`].

use serde::{Deserialize, Serialize};

/// A single cell edit on a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChanged {
    /// Name of the sheet/table that was edited
    pub sheet: String,
    /// 1-based sheet row (row 1 is the header row)
    pub row: u32,
    /// Header of the edited column
    pub column: String,
}

impl RowChanged {
    pub fn new(sheet: impl Into<String>, row: u32, column: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            column: column.into(),
        }
    }
}
