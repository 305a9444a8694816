//! Loader for the wide tabular ECG export.
//!
//! Each row is `gender, age, first_label, second_label, third_label,
//! c_1 .. c_N` with no header. The `c_i` samples are lead-major: the first
//! `N / leads` belong to lead 1, the next block to lead 2 and so on.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use candle_core::{Device, Tensor};
use tracing::{debug, info, warn};

use super::{encode_gender, parse_cell};
use crate::config::DataConfig;
use crate::error::{EcgError, Result};

const META_COLUMNS: [&str; 5] = ["gender", "age", "first_label", "second_label", "third_label"];

/// Column names of the export for `columns_count` ECG samples.
pub fn column_names(columns_count: usize) -> Vec<String> {
    META_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain((1..=columns_count).map(|i| format!("c_{i}")))
        .collect()
}

/// Loaded table: one row per recording.
pub struct EcgTable {
    /// `[rows, non_ecg_dim]`
    pub non_ecg: Tensor,
    /// `[rows, leads, len]`
    pub ecg: Tensor,
    /// `[rows]`, zero-based class ids (u32)
    pub labels: Tensor,
    pub non_ecg_columns: Vec<String>,
}

impl EcgTable {
    pub fn rows(&self) -> usize {
        self.labels.dims().first().copied().unwrap_or(0)
    }

    pub fn non_ecg_dim(&self) -> usize {
        self.non_ecg_columns.len()
    }

    pub fn leads(&self) -> usize {
        self.ecg.dims().get(1).copied().unwrap_or(0)
    }

    pub fn samples_per_lead(&self) -> usize {
        self.ecg.dims().get(2).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    pub fn max_label(&self) -> Result<u32> {
        let labels: Vec<u32> = self.labels.to_vec1()?;
        Ok(labels.into_iter().max().unwrap_or(0))
    }
}

/// Resolved column layout for one load.
struct Layout {
    target: usize,
    features: Vec<usize>,
    width: usize,
}

fn resolve_layout(cfg: &DataConfig) -> Result<Layout> {
    if cfg.leads == 0 || cfg.columns_count == 0 || cfg.columns_count % cfg.leads != 0 {
        return Err(EcgError::Config(format!(
            "{} ECG columns cannot be split into {} leads",
            cfg.columns_count, cfg.leads
        )));
    }
    let target = META_COLUMNS
        .iter()
        .position(|c| *c == cfg.target_column)
        .ok_or_else(|| {
            EcgError::Config(format!("unknown target column '{}'", cfg.target_column))
        })?;
    for useless in &cfg.useless_columns {
        if useless == &cfg.target_column {
            return Err(EcgError::Config(format!(
                "target column '{useless}' is also listed as useless"
            )));
        }
        if !META_COLUMNS.contains(&useless.as_str()) {
            return Err(EcgError::Config(format!(
                "cannot drop column '{useless}': only metadata columns may be dropped"
            )));
        }
    }
    let features = META_COLUMNS
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != target && !cfg.useless_columns.iter().any(|u| u == *name))
        .map(|(i, _)| i)
        .collect();
    Ok(Layout {
        target,
        features,
        width: META_COLUMNS.len() + cfg.columns_count,
    })
}

/// Names of the metadata columns kept as non-ECG features, in model input
/// order.
pub fn non_ecg_columns(cfg: &DataConfig) -> Result<Vec<String>> {
    let layout = resolve_layout(cfg)?;
    Ok(feature_names(&layout))
}

fn feature_names(layout: &Layout) -> Vec<String> {
    layout
        .features
        .iter()
        .map(|&i| META_COLUMNS[i].to_string())
        .collect()
}

/// 1-based class id cell to a 0-based label.
fn parse_label(cell: Option<&str>) -> Option<u32> {
    let v: f64 = cell?.trim().parse().ok()?;
    if v.is_finite() && v >= 1.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
        Some(v as u32 - 1)
    } else {
        None
    }
}

pub fn load_table(path: impl AsRef<Path>, cfg: &DataConfig, device: &Device) -> Result<EcgTable> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading ECG table");
    let file = File::open(path)?;
    parse_table(file, cfg, device)
}

pub fn parse_table<R: Read>(reader: R, cfg: &DataConfig, device: &Device) -> Result<EcgTable> {
    let layout = resolve_layout(cfg)?;
    let leads = cfg.leads;
    let len = cfg.columns_count / leads;

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut non_ecg = Vec::new();
    let mut ecg = Vec::new();
    let mut labels = Vec::new();
    let mut skipped = 0usize;

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        if row == 0 && record.get(0).map(str::trim) == Some("gender") {
            debug!("skipping header row");
            continue;
        }
        if record.len() > layout.width {
            return Err(EcgError::Data(format!(
                "row {row} has {} cells, expected at most {}",
                record.len(),
                layout.width
            )));
        }
        let Some(label) = parse_label(record.get(layout.target)) else {
            warn!(row, "row has no usable target, skipping");
            skipped += 1;
            continue;
        };
        labels.push(label);
        for &col in &layout.features {
            let cell = record.get(col);
            non_ecg.push(if col == 0 {
                encode_gender(cell.unwrap_or(""))
            } else {
                parse_cell(cell)
            });
        }
        ecg.extend((0..cfg.columns_count).map(|j| parse_cell(record.get(META_COLUMNS.len() + j))));
    }

    let rows = labels.len();
    if rows == 0 {
        return Err(EcgError::Data("table has no usable rows".into()));
    }
    info!(rows, skipped, leads, len, "ECG table loaded");

    let non_ecg_columns = feature_names(&layout);
    Ok(EcgTable {
        non_ecg: Tensor::from_vec(non_ecg, (rows, non_ecg_columns.len()), device)?,
        ecg: Tensor::from_vec(ecg, (rows, leads, len), device)?,
        labels: Tensor::from_vec(labels, rows, device)?,
        non_ecg_columns,
    })
}
