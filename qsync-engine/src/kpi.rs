//! KPI Calculator
//!
//! Earned-value style metrics from the normalized financial inputs:
//!
//! | KPI | Rule | Precision |
//! |-----|------|-----------|
//! | `cpi` | EV / AC when AC > 0 | 3 |
//! | `spi` | EV / BAC when BAC > 0 | 3 |
//! | `eac` | EAC base / cpi when cpi > 0 | 2 |
//! | `etc` | eac − AC when eac is defined | 2 |
//!
//! `spi` uses the budget as a stand-in for planned value: there is no
//! planned-value timeline. The EAC base is the contract value
//! (`valor_contrato`, else `monto_ofertado`) when one is set, else the budget.
//! Both choices are kept as they are.
//!
//! Undefined results are `None` and render as an empty cell / JSON `null`.
//! `cpi` and `spi` are computed from unrounded values; rounding applies to
//! each output independently.

use qsync_common::schema::{columns, KPI_COLUMNS};
use qsync_common::{CellValue, Record};

const RATIO_DECIMALS: i32 = 3;
const CURRENCY_DECIMALS: i32 = 2;

/// Financial inputs read from a normalized record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiInputs {
    /// Earned value (`acumulado_avance_valorizado`)
    pub ev: f64,
    /// Actual cost (`acumulado_coste_real`)
    pub ac: f64,
    /// Budget at completion (`costo_presupuestado`)
    pub bac: f64,
    /// Numerator for EAC
    pub eac_base: f64,
}

impl KpiInputs {
    /// Inputs with the budget as EAC base
    pub fn new(ev: f64, ac: f64, bac: f64) -> Self {
        Self { ev, ac, bac, eac_base: bac }
    }

    pub fn from_record(record: &Record) -> Self {
        let bac = record.number(columns::COSTO_PRESUPUESTADO);
        let contract = [columns::VALOR_CONTRATO, columns::MONTO_OFERTADO]
            .iter()
            .map(|col| record.number(col))
            .find(|v| *v > 0.0);
        Self {
            ev: record.number(columns::ACUMULADO_AVANCE_VALORIZADO),
            ac: record.number(columns::ACUMULADO_COSTE_REAL),
            bac,
            eac_base: contract.unwrap_or(bac),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kpis {
    pub cpi: Option<f64>,
    pub spi: Option<f64>,
    pub eac: Option<f64>,
    pub etc: Option<f64>,
}

impl Kpis {
    /// KPI cells in write-back order (`cpi`, `spi`, `eac`, `etc`)
    pub fn cells(&self) -> [(&'static str, CellValue); 4] {
        let values = [self.cpi, self.spi, self.eac, self.etc];
        let mut out = KPI_COLUMNS.map(|col| (col, CellValue::Empty));
        for (slot, value) in out.iter_mut().zip(values) {
            slot.1 = CellValue::from_option(value);
        }
        out
    }
}

/// `computeKpis(EV, AC, BAC)` with the budget as EAC base
pub fn compute_kpis(ev: f64, ac: f64, bac: f64) -> Kpis {
    compute(&KpiInputs::new(ev, ac, bac))
}

pub fn compute(inputs: &KpiInputs) -> Kpis {
    let cpi = (inputs.ac > 0.0).then(|| inputs.ev / inputs.ac);
    let spi = (inputs.bac > 0.0).then(|| inputs.ev / inputs.bac);
    let eac = cpi.filter(|c| *c > 0.0).map(|c| inputs.eac_base / c);
    let etc = eac.map(|e| e - inputs.ac);

    Kpis {
        cpi: round_finite(cpi, RATIO_DECIMALS),
        spi: round_finite(spi, RATIO_DECIMALS),
        eac: round_finite(eac, CURRENCY_DECIMALS),
        etc: round_finite(etc, CURRENCY_DECIMALS),
    }
}

fn round_finite(value: Option<f64>, decimals: i32) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| round_half_away(v, decimals))
        .filter(|v| v.is_finite())
}

/// Round half away from zero at `decimals` places
pub fn round_half_away(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
