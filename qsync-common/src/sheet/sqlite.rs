//! SQLite-backed table
//!
//! Headers live in `sheet_columns` (one row per position) and each data row
//! is a JSON array of cells in `sheet_rows`. Rows shorter than the header
//! row read back padded with empty cells; longer rows are returned as stored.

use super::{Sheet, FIRST_DATA_ROW, HEADER_ROW};
use crate::cell::CellValue;
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct SqliteSheet {
    pool: SqlitePool,
    name: String,
}

impl SqliteSheet {
    pub fn new(pool: SqlitePool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }

    /// Create the table with the given header row if it has no headers yet
    pub async fn ensure_headers(&self, headers: &[&str]) -> Result<()> {
        if !self.headers().await?.is_empty() {
            return Ok(());
        }
        for header in headers {
            self.append_column(header).await?;
        }
        Ok(())
    }

    async fn load_cells(&self, row: u32) -> Result<Option<Vec<CellValue>>> {
        let stored: Option<String> =
            sqlx::query_scalar("SELECT cells FROM sheet_rows WHERE sheet = ? AND row_num = ?")
                .bind(&self.name)
                .bind(row as i64)
                .fetch_optional(&self.pool)
                .await?;
        stored
            .map(|json| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    async fn store_cells(&self, row: u32, cells: &[CellValue]) -> Result<()> {
        let json = serde_json::to_string(cells)?;
        sqlx::query(
            r#"
            INSERT INTO sheet_rows (sheet, row_num, cells, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(sheet, row_num) DO UPDATE SET
                cells = excluded.cells,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&self.name)
        .bind(row as i64)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn check_data_row(&self, row: u32) -> Result<()> {
        if row < FIRST_DATA_ROW || row > self.last_row().await? {
            return Err(Error::NotFound(format!("row {} in sheet '{}'", row, self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl Sheet for SqliteSheet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn headers(&self) -> Result<Vec<String>> {
        let headers: Vec<String> = sqlx::query_scalar(
            "SELECT header FROM sheet_columns WHERE sheet = ? ORDER BY position",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await?;
        Ok(headers)
    }

    async fn last_row(&self) -> Result<u32> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(row_num) FROM sheet_rows WHERE sheet = ?")
                .bind(&self.name)
                .fetch_one(&self.pool)
                .await?;
        Ok(max.map(|m| m as u32).unwrap_or(HEADER_ROW))
    }

    async fn read_row(&self, row: u32) -> Result<Vec<CellValue>> {
        self.check_data_row(row).await?;
        let width = self.headers().await?.len();
        let mut cells = self.load_cells(row).await?.unwrap_or_default();
        if cells.len() < width {
            cells.resize(width, CellValue::Empty);
        }
        Ok(cells)
    }

    async fn write_cell(&self, row: u32, header: &str, value: CellValue) -> Result<()> {
        self.check_data_row(row).await?;
        let headers = self.headers().await?;
        let col = headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| Error::NotFound(format!("column '{}' in sheet '{}'", header, self.name)))?;
        let mut cells = self.load_cells(row).await?.unwrap_or_default();
        if cells.len() < headers.len() {
            cells.resize(headers.len(), CellValue::Empty);
        }
        cells[col] = value;
        self.store_cells(row, &cells).await
    }

    async fn append_column(&self, header: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sheet_columns (sheet, position, header)
            VALUES (?, (SELECT COALESCE(MAX(position), -1) + 1 FROM sheet_columns WHERE sheet = ?), ?)
            "#,
        )
        .bind(&self.name)
        .bind(&self.name)
        .bind(header)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_row(&self, values: Vec<CellValue>) -> Result<u32> {
        let row = self.last_row().await?.max(HEADER_ROW) + 1;
        self.store_cells(row, &values).await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn open_sheet(dir: &TempDir) -> SqliteSheet {
        let pool = init_database(&dir.path().join("qsync.db")).await.unwrap();
        SqliteSheet::new(pool, "Cotizaciones_Master")
    }

    #[tokio::test]
    async fn test_headers_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let sheet = open_sheet(&dir).await;
        sheet.ensure_headers(&["id", "cliente", "cpi"]).await.unwrap();
        sheet.ensure_headers(&["ignored"]).await.unwrap();
        assert_eq!(sheet.headers().await.unwrap(), vec!["id", "cliente", "cpi"]);
    }

    #[tokio::test]
    async fn test_rows_roundtrip_typed_cells() {
        let dir = TempDir::new().unwrap();
        let sheet = open_sheet(&dir).await;
        sheet.ensure_headers(&["id", "monto_ofertado"]).await.unwrap();
        assert_eq!(sheet.last_row().await.unwrap(), HEADER_ROW);

        let row = sheet
            .append_row(vec![CellValue::text("abc"), CellValue::Number(1500.0)])
            .await
            .unwrap();
        assert_eq!(row, FIRST_DATA_ROW);
        assert_eq!(
            sheet.read_row(row).await.unwrap(),
            vec![CellValue::text("abc"), CellValue::Number(1500.0)]
        );
    }

    #[tokio::test]
    async fn test_new_columns_read_as_empty_and_are_writable() {
        let dir = TempDir::new().unwrap();
        let sheet = open_sheet(&dir).await;
        sheet.ensure_headers(&["id"]).await.unwrap();
        let row = sheet.append_row(vec![CellValue::text("abc")]).await.unwrap();

        sheet.append_column("eac").await.unwrap();
        assert_eq!(sheet.read_row(row).await.unwrap(), vec![CellValue::text("abc"), CellValue::Empty]);

        sheet.write_cell(row, "eac", CellValue::Number(80000.0)).await.unwrap();
        assert_eq!(sheet.read_row(row).await.unwrap()[1], CellValue::Number(80000.0));
    }

    #[tokio::test]
    async fn test_out_of_range_rows_are_not_found() {
        let dir = TempDir::new().unwrap();
        let sheet = open_sheet(&dir).await;
        sheet.ensure_headers(&["id"]).await.unwrap();
        assert!(matches!(sheet.read_row(2).await, Err(Error::NotFound(_))));
        assert!(matches!(
            sheet.write_cell(1, "id", CellValue::Empty).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sheets_are_isolated_by_name() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("qsync.db")).await.unwrap();
        let a = SqliteSheet::new(pool.clone(), "a");
        let b = SqliteSheet::new(pool, "b");
        a.ensure_headers(&["id"]).await.unwrap();
        a.append_row(vec![CellValue::text("x")]).await.unwrap();
        assert!(b.headers().await.unwrap().is_empty());
        assert_eq!(b.last_row().await.unwrap(), HEADER_ROW);
    }
}
