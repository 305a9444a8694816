//! Local scalar log: one CSV per run under a timestamped directory.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarPoint {
    pub tag: String,
    pub step: usize,
    pub value: f64,
}

pub struct ScalarWriter {
    run_dir: PathBuf,
    writer: csv::Writer<File>,
    history: Vec<ScalarPoint>,
}

impl ScalarWriter {
    /// Start a run in `<log_dir>/<local timestamp>/scalars.csv`.
    pub fn create(log_dir: impl AsRef<Path>) -> Result<Self> {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S%.3f");
        Self::create_in(log_dir.as_ref().join(stamp.to_string()))
    }

    pub fn create_in(run_dir: impl Into<PathBuf>) -> Result<Self> {
        let run_dir = run_dir.into();
        create_dir_all(&run_dir)?;
        let writer = csv::Writer::from_path(run_dir.join("scalars.csv"))?;
        Ok(Self {
            run_dir,
            writer,
            history: Vec::new(),
        })
    }

    pub fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        let point = ScalarPoint {
            tag: tag.to_string(),
            step,
            value,
        };
        self.writer.serialize(&point)?;
        self.history.push(point);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn history(&self) -> &[ScalarPoint] {
        &self.history
    }

    /// Points logged under `tag`, in logging order.
    pub fn series(&self, tag: &str) -> Vec<(usize, f64)> {
        self.history
            .iter()
            .filter(|p| p.tag == tag)
            .map(|p| (p.step, p.value))
            .collect()
    }

    pub fn into_history(mut self) -> Result<Vec<ScalarPoint>> {
        self.flush()?;
        Ok(self.history)
    }
}
