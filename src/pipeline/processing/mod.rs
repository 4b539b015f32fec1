// Pipeline processing: cleaning, classification, validation and reports

pub mod anomaly;
pub mod bias;
pub mod dedup;
pub mod enrich;
pub mod normalize;
pub mod quality_gate;
pub mod stats;
pub mod summary;
pub mod validate;

use crate::pipeline::table::TrialTable;

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Finite numbers parsed from a column in row order; unparsable cells are
/// skipped. `None` when the column is absent.
pub fn numeric_values(table: &TrialTable, column: &str) -> Option<Vec<f64>> {
    let values = table
        .column(column)?
        .flatten()
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect();
    Some(values)
}
