//! Persistent table access
//!
//! The master table is the source of truth for every record. The engine
//! reads and writes it only through [`Sheet`], so the hosting environment
//! can be a SQLite database ([`SqliteSheet`]), an in-memory table
//! ([`MemorySheet`]), or any other adapter.
//!
//! Rows are addressed with 1-based sheet numbers: row [`HEADER_ROW`] holds
//! the headers and data starts at [`FIRST_DATA_ROW`].

pub mod memory;
pub mod sqlite;

pub use memory::MemorySheet;
pub use sqlite::SqliteSheet;

use crate::cell::CellValue;
use crate::Result;
use async_trait::async_trait;

pub const HEADER_ROW: u32 = 1;
pub const FIRST_DATA_ROW: u32 = 2;

/// Row/column access to one table
#[async_trait]
pub trait Sheet: Send + Sync {
    /// Table name as reported in change events
    fn name(&self) -> &str;

    /// Current header row, in column order
    async fn headers(&self) -> Result<Vec<String>>;

    /// Last row number holding data; [`HEADER_ROW`] when the table has no data rows
    async fn last_row(&self) -> Result<u32>;

    /// Current values of a data row, in header order
    async fn read_row(&self, row: u32) -> Result<Vec<CellValue>>;

    /// Overwrite one cell of a data row
    async fn write_cell(&self, row: u32, header: &str, value: CellValue) -> Result<()>;

    /// Append a header at the end of the header row (existing rows read it as empty)
    async fn append_column(&self, header: &str) -> Result<()>;

    /// Append a data row, returning its row number
    async fn append_row(&self, values: Vec<CellValue>) -> Result<u32>;
}

/// Decides whether change events on a table concern the master table
pub trait PrimaryTable: Send + Sync {
    fn is_primary(&self, sheet: &str) -> bool;
}

/// Primary-table check by name: the master sheet and its display aliases
#[derive(Debug, Clone)]
pub struct MasterSheetNames {
    names: Vec<String>,
}

impl MasterSheetNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl PrimaryTable for MasterSheetNames {
    fn is_primary(&self, sheet: &str) -> bool {
        self.names.iter().any(|n| n == sheet)
    }
}
