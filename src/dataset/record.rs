//! Raw 12-lead records and the fixed-length windows cut from them.
//!
//! A record directory holds a reference table
//! (`Recording,First_label,Second_label,Third_label`) and one
//! `<Recording>.csv` per record: a `gender,age` line followed by one line of
//! samples per lead.

use std::fs::File;
use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::{debug, info};

use super::{encode_gender, parse_cell};
use crate::core::util::zscore;
use crate::error::{EcgError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct EcgRecord {
    pub name: String,
    pub gender: f32,
    pub age: f32,
    pub leads: Vec<Vec<f32>>,
    /// Zero-based class id.
    pub label: u32,
}

impl EcgRecord {
    pub fn samples(&self) -> usize {
        self.leads.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceRow {
    #[serde(rename = "Recording")]
    recording: String,
    #[serde(rename = "First_label")]
    first_label: u32,
}

pub struct RecordLoader {
    dir: PathBuf,
    reference: PathBuf,
}

impl RecordLoader {
    pub fn new(dir: impl Into<PathBuf>, reference: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            reference: reference.into(),
        }
    }

    /// Load every record named in the reference table, z-scoring each lead
    /// when `normalize` is set.
    pub fn load(&self, normalize: bool) -> Result<Vec<EcgRecord>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.reference)?;
        let mut records = Vec::new();
        for row in rdr.deserialize() {
            let row: ReferenceRow = row?;
            if row.first_label == 0 {
                return Err(EcgError::Data(format!(
                    "record {} has label 0; labels are 1-based",
                    row.recording
                )));
            }
            let path = self.dir.join(format!("{}.csv", row.recording));
            let mut record = read_record(&path, &row.recording, row.first_label - 1)?;
            if normalize {
                record.leads.iter_mut().for_each(|lead| zscore(lead));
            }
            debug!(name = %record.name, leads = record.leads.len(), samples = record.samples(), "record loaded");
            records.push(record);
        }
        info!(count = records.len(), dir = %self.dir.display(), "loaded ECG records");
        Ok(records)
    }
}

fn read_record(path: &Path, name: &str, label: u32) -> Result<EcgRecord> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut rows = rdr.records();

    let meta = rows
        .next()
        .ok_or_else(|| EcgError::Data(format!("record {name} is empty")))??;
    let gender = encode_gender(meta.get(0).unwrap_or(""));
    let age = parse_cell(meta.get(1));

    let mut leads = Vec::new();
    for row in rows {
        let row = row?;
        leads.push(row.iter().map(|c| parse_cell(Some(c))).collect::<Vec<f32>>());
    }
    let Some(samples) = leads.first().map(Vec::len) else {
        return Err(EcgError::Data(format!("record {name} has no leads")));
    };
    if samples == 0 || leads.iter().any(|l| l.len() != samples) {
        return Err(EcgError::Data(format!(
            "record {name} has leads of unequal or zero length"
        )));
    }
    Ok(EcgRecord {
        name: name.to_string(),
        gender,
        age,
        leads,
        label,
    })
}

/// One model-ready window with a batch axis of 1.
pub struct EcgSample {
    pub name: String,
    /// `[1, 2]`: gender, age
    pub non_ecg: Tensor,
    /// `[1, leads, slice_len]`
    pub ecg: Tensor,
    /// `[1]` (u32)
    pub label: Tensor,
    pub label_id: u32,
}

/// Fixed-length windows cut from each record at seeded random offsets.
///
/// Items are ordered record by record, so index 0 is always the first
/// window of the first record.
pub struct SlicedEcgDataset {
    records: Vec<EcgRecord>,
    windows: Vec<(usize, usize)>,
    slice_len: usize,
    device: Device,
}

impl SlicedEcgDataset {
    pub fn new(
        records: Vec<EcgRecord>,
        slices_count: usize,
        slice_len: usize,
        seed: u64,
        device: &Device,
    ) -> Result<Self> {
        if slices_count == 0 || slice_len == 0 {
            return Err(EcgError::Config(
                "slices_count and slice_len must be positive".into(),
            ));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut windows = Vec::new();
        for (r, record) in records.iter().enumerate() {
            let samples = record.samples();
            if samples < slice_len {
                windows.push((r, 0));
                continue;
            }
            for _ in 0..slices_count {
                windows.push((r, rng.random_range(0..=samples - slice_len)));
            }
        }
        Ok(Self {
            records,
            windows,
            slice_len,
            device: device.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<EcgSample> {
        let &(r, offset) = self.windows.get(index).ok_or_else(|| {
            EcgError::Data(format!("window {index} out of range ({})", self.len()))
        })?;
        let record = &self.records[r];
        let leads = record.leads.len();

        let mut ecg = Vec::with_capacity(leads * self.slice_len);
        for lead in &record.leads {
            let end = (offset + self.slice_len).min(lead.len());
            ecg.extend_from_slice(&lead[offset..end]);
            // Zero-pad short records on the right.
            ecg.extend(std::iter::repeat_n(0.0, offset + self.slice_len - end));
        }

        Ok(EcgSample {
            name: record.name.clone(),
            non_ecg: Tensor::from_vec(vec![record.gender, record.age], (1, 2), &self.device)?,
            ecg: Tensor::from_vec(ecg, (1, leads, self.slice_len), &self.device)?,
            label: Tensor::from_vec(vec![record.label], 1, &self.device)?,
            label_id: record.label,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<EcgSample>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}
