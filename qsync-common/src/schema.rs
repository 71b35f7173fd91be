//! Canonical master-table schema
//!
//! Declarative list of the columns the master quotation table is expected to
//! carry, plus the column groups the reconciliation engine treats specially.
//! Missing columns are detected by [`missing_columns`] and appended by the
//! engine's schema upgrade; existing columns are never removed or reordered.

/// Column header names with engine-level meaning
pub mod columns {
    pub const ID: &str = "id";
    pub const FECHA_REGISTRO: &str = "fecha_registro";
    pub const PROBABILIDAD: &str = "probabilidad";

    pub const MONTO_ESTIMADO: &str = "monto_estimado";
    pub const MONTO_OFERTADO: &str = "monto_ofertado";
    pub const VALOR_CONTRATO: &str = "valor_contrato";
    pub const COSTO_PRESUPUESTADO: &str = "costo_presupuestado";
    pub const ACUMULADO_COSTE_REAL: &str = "acumulado_coste_real";
    pub const ACUMULADO_AVANCE_VALORIZADO: &str = "acumulado_avance_valorizado";
    pub const KPI_SCORE: &str = "kpi_score";

    pub const CPI: &str = "cpi";
    pub const SPI: &str = "spi";
    pub const EAC: &str = "eac";
    pub const ETC: &str = "etc";

    pub const MES_INICIO_FORECAST: &str = "mes_inicio_forecast";
    pub const MES_FIN_FORECAST: &str = "mes_fin_forecast";
}

use columns::*;

/// Computed KPI columns, in write-back order
pub const KPI_COLUMNS: [&str; 4] = [CPI, SPI, EAC, ETC];

/// Columns written by the engine itself; edits to these never trigger a run
pub const DERIVED_COLUMNS: [&str; 6] = [ID, FECHA_REGISTRO, CPI, SPI, EAC, ETC];

/// Columns whose edit requires KPI recomputation
pub const KPI_INPUT_COLUMNS: [&str; 5] = [
    COSTO_PRESUPUESTADO,
    ACUMULADO_COSTE_REAL,
    ACUMULADO_AVANCE_VALORIZADO,
    MONTO_OFERTADO,
    VALOR_CONTRATO,
];

/// Financial and derived-numeric columns coerced to numbers on normalization
pub const NUMERIC_COLUMNS: [&str; 11] = [
    MONTO_ESTIMADO,
    MONTO_OFERTADO,
    VALOR_CONTRATO,
    COSTO_PRESUPUESTADO,
    ACUMULADO_COSTE_REAL,
    ACUMULADO_AVANCE_VALORIZADO,
    EAC,
    ETC,
    CPI,
    SPI,
    KPI_SCORE,
];

/// Non-`fecha*` columns that still hold dates
const EXTRA_DATE_COLUMNS: [&str; 2] = [MES_INICIO_FORECAST, MES_FIN_FORECAST];

/// Canonical master columns, in the order they are appended when missing
pub const MASTER_COLUMNS: &[&str] = &[
    ID,
    FECHA_REGISTRO,
    "Cliente",
    "Zona de Trabajo",
    "Solicitante",
    "Industria",
    "Responsable Técnico",
    "Responsable Económico",
    "descripcion",
    "estado",
    PROBABILIDAD,
    "fecha_solicitud",
    "fecha_envio",
    "fecha_adjudicacion",
    MONTO_ESTIMADO,
    MONTO_OFERTADO,
    VALOR_CONTRATO,
    COSTO_PRESUPUESTADO,
    ACUMULADO_COSTE_REAL,
    ACUMULADO_AVANCE_VALORIZADO,
    CPI,
    SPI,
    EAC,
    ETC,
    KPI_SCORE,
    MES_INICIO_FORECAST,
    MES_FIN_FORECAST,
];

/// Header normalization used for schema comparison (surrounding whitespace ignored)
pub fn norm_header(header: &str) -> &str {
    header.trim()
}

/// Date-like column: header starts with `fecha` (case-insensitive) or is a forecast month
pub fn is_date_column(header: &str) -> bool {
    header.to_lowercase().starts_with("fecha") || EXTRA_DATE_COLUMNS.contains(&header)
}

pub fn is_numeric_column(header: &str) -> bool {
    NUMERIC_COLUMNS.contains(&header)
}

pub fn is_derived_column(header: &str) -> bool {
    DERIVED_COLUMNS.contains(&norm_header(header))
}

pub fn is_kpi_input_column(header: &str) -> bool {
    KPI_INPUT_COLUMNS.contains(&norm_header(header))
}

/// Canonical columns absent from `existing`, in canonical order
pub fn missing_columns(existing: &[String]) -> Vec<&'static str> {
    MASTER_COLUMNS
        .iter()
        .copied()
        .filter(|col| !existing.iter().any(|h| norm_header(h) == *col))
        .collect()
}
