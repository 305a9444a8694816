//! Train/test split and mini-batch iteration over a loaded table.

use candle_core::{Device, Tensor};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::table::EcgTable;
use crate::error::{EcgError, Result};

/// One mini-batch of model inputs and targets.
pub struct EcgBatch {
    pub non_ecg: Tensor,
    pub ecg: Tensor,
    pub labels: Tensor,
}

impl EcgBatch {
    pub fn size(&self) -> usize {
        self.labels.dims().first().copied().unwrap_or(0)
    }
}

/// Mini-batches over a fixed set of rows, in the current row order.
pub struct BatchLoader {
    non_ecg: Tensor,
    ecg: Tensor,
    labels: Tensor,
    order: Vec<usize>,
    batch_size: usize,
}

fn gather_rows(tensor: &Tensor, indices: &[usize], device: &Device) -> Result<Tensor> {
    let idx: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
    let idx = Tensor::new(idx.as_slice(), device)?;
    Ok(tensor.index_select(&idx, 0)?)
}

impl BatchLoader {
    pub fn new(non_ecg: Tensor, ecg: Tensor, labels: Tensor, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(EcgError::Config("batch size must be positive".into()));
        }
        let rows = labels.dim(0)?;
        if non_ecg.dim(0)? != rows || ecg.dim(0)? != rows {
            return Err(EcgError::Data("inputs and labels disagree on row count".into()));
        }
        Ok(Self {
            non_ecg,
            ecg,
            labels,
            order: (0..rows).collect(),
            batch_size,
        })
    }

    fn from_rows(table: &EcgTable, rows: &[usize], batch_size: usize) -> Result<Self> {
        let device = table.labels.device().clone();
        Self::new(
            gather_rows(&table.non_ecg, rows, &device)?,
            gather_rows(&table.ecg, rows, &device)?,
            gather_rows(&table.labels, rows, &device)?,
            batch_size,
        )
    }

    /// Number of batches per pass.
    pub fn len(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.order.len()
    }

    /// Reorder rows for a new epoch; the permutation depends only on
    /// `seed + epoch`.
    pub fn reshuffle(&mut self, seed: u64, epoch: usize) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
        self.order.sort_unstable();
        self.order.shuffle(&mut rng);
    }

    pub fn batch(&self, index: usize) -> Result<EcgBatch> {
        let start = index * self.batch_size;
        if start >= self.order.len() {
            return Err(EcgError::Data(format!(
                "batch {index} out of range ({} batches)",
                self.len()
            )));
        }
        let end = (start + self.batch_size).min(self.order.len());
        let rows = &self.order[start..end];
        let device = self.labels.device().clone();
        Ok(EcgBatch {
            non_ecg: gather_rows(&self.non_ecg, rows, &device)?,
            ecg: gather_rows(&self.ecg, rows, &device)?,
            labels: gather_rows(&self.labels, rows, &device)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<EcgBatch>> + '_ {
        (0..self.len()).map(move |i| self.batch(i))
    }
}

/// Shuffle rows with `seed` and hold out `round(rows * test_size)` of them.
///
/// Returns `(train, test)`.
pub fn split(
    table: &EcgTable,
    test_size: f64,
    batch_size: usize,
    seed: u64,
) -> Result<(BatchLoader, BatchLoader)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(EcgError::Config(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let rows = table.rows();
    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = (rows as f64 * test_size).round() as usize;
    if n_test == 0 || n_test >= rows {
        return Err(EcgError::Data(format!(
            "{rows} rows cannot be split with test_size {test_size}"
        )));
    }
    let (test_rows, train_rows) = indices.split_at(n_test);
    info!(train = train_rows.len(), test = test_rows.len(), "split table");

    Ok((
        BatchLoader::from_rows(table, train_rows, batch_size)?,
        BatchLoader::from_rows(table, test_rows, batch_size)?,
    ))
}
