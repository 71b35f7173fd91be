//! Database initialization tests

use qsync_common::db::init_database;
use qsync_common::sheet::{Sheet, SqliteSheet};
use qsync_common::CellValue;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("qsync.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_reopen_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("qsync.db");

    {
        let pool = init_database(&db_path).await.unwrap();
        let sheet = SqliteSheet::new(pool.clone(), "Cotizaciones_Master");
        sheet.ensure_headers(&["id", "Cliente"]).await.unwrap();
        sheet
            .append_row(vec![CellValue::text("a-1"), CellValue::text("ACME")])
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let sheet = SqliteSheet::new(pool, "Cotizaciones_Master");
    assert_eq!(sheet.headers().await.unwrap(), vec!["id", "Cliente"]);
    assert_eq!(sheet.read_row(2).await.unwrap()[1], CellValue::text("ACME"));
}
