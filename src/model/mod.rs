//! ECG classifiers and the factory that builds or restores them.
//!
//! Every model consumes the same pair of inputs: a small vector of
//! non-ECG features (`[batch, non_ecg_dim]`, e.g. gender and age) and the
//! ECG block itself (`[batch, leads, len]`), and produces class logits
//! `[batch, num_classes]`. Weights live in a [`VarMap`] so training and
//! checkpointing go through candle's variable store.

pub mod cnn;
pub mod mlp;

use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EcgError, Result};

pub use cnn::Cnn;
pub use mlp::Mlp;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelKind {
    #[default]
    #[value(name = "MLP")]
    Mlp,
    #[value(name = "CNN")]
    Cnn,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Mlp => "MLP",
            ModelKind::Cnn => "CNN",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input and output dimensions a model is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub non_ecg_dim: usize,
    pub leads: usize,
    pub len: usize,
    pub num_classes: usize,
}

pub trait EcgModel {
    fn kind(&self) -> ModelKind;
    fn shape(&self) -> ModelShape;
    fn varmap(&self) -> &VarMap;
    /// Class logits `[batch, num_classes]`.
    fn forward(&self, non_ecg: &Tensor, ecg: &Tensor) -> Result<Tensor>;
}

/// Window lengths an architecture can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowLen {
    /// Exactly `shape.len`.
    Exact,
    /// Any length from the given minimum up.
    AtLeast(usize),
}

/// Validate a `(non_ecg, ecg)` pair against `shape`; returns the batch size.
pub(crate) fn check_inputs(
    shape: &ModelShape,
    non_ecg: &Tensor,
    ecg: &Tensor,
    window: WindowLen,
) -> Result<usize> {
    let (b, leads, len) = ecg.dims3()?;
    let (b2, d) = non_ecg.dims2()?;
    if b != b2 {
        return Err(EcgError::Data(format!(
            "batch mismatch: non_ecg has {b2} rows, ecg has {b}"
        )));
    }
    let len_ok = match window {
        WindowLen::Exact => len == shape.len,
        WindowLen::AtLeast(min) => len >= min,
    };
    if d != shape.non_ecg_dim || leads != shape.leads || !len_ok {
        return Err(EcgError::Data(format!(
            "input shape non_ecg=[{b2}, {d}] ecg=[{b}, {leads}, {len}] does not fit model {shape:?} ({window:?})"
        )));
    }
    Ok(b)
}

/// Build `kind` with freshly initialized weights.
pub fn create_model(kind: ModelKind, shape: ModelShape, device: &Device) -> Result<Box<dyn EcgModel>> {
    if shape.num_classes == 0 || shape.leads == 0 || shape.len == 0 {
        return Err(EcgError::Config(format!("degenerate model shape {shape:?}")));
    }
    let model: Box<dyn EcgModel> = match kind {
        ModelKind::Mlp => Box::new(Mlp::new(shape, device)?),
        ModelKind::Cnn => Box::new(Cnn::new(shape, device)?),
    };
    Ok(model)
}

/// Build `kind` and overwrite its weights from a safetensors checkpoint.
pub fn load_model(
    kind: ModelKind,
    shape: ModelShape,
    path: impl AsRef<Path>,
    device: &Device,
) -> Result<Box<dyn EcgModel>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EcgError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("checkpoint {} not found", path.display()),
        )));
    }
    let model = create_model(kind, shape, device)?;
    // VarMap clones share storage, so loading through the clone updates the model.
    let mut varmap = model.varmap().clone();
    varmap.load(path).map_err(|err| {
        EcgError::Config(format!(
            "checkpoint {} does not fit {kind} {shape:?}: {err}",
            path.display()
        ))
    })?;
    info!(model = %kind, path = %path.display(), "loaded checkpoint");
    Ok(model)
}

pub fn save_model(model: &dyn EcgModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    model.varmap().save(path)?;
    info!(model = %model.kind(), path = %path.display(), "saved checkpoint");
    Ok(())
}
