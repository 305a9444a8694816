//! ECG data sources: the wide tabular export used for training and the
//! per-record lead files used for explanations.

pub mod record;
pub mod split;
pub mod table;

pub use record::{EcgRecord, EcgSample, RecordLoader, SlicedEcgDataset};
pub use split::{BatchLoader, EcgBatch, split};
pub use table::{EcgTable, column_names, load_table, non_ecg_columns};

/// Gender cell to a numeric feature: male 1, female 0, unknown 0.5.
pub fn encode_gender(cell: &str) -> f32 {
    match cell.trim().to_ascii_lowercase().as_str() {
        "male" | "m" | "1" => 1.0,
        "female" | "f" | "0" => 0.0,
        _ => 0.5,
    }
}

/// Numeric cell, with blanks and junk read as 0.
pub(crate) fn parse_cell(cell: Option<&str>) -> f32 {
    cell.map(str::trim)
        .and_then(|c| c.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
