//! Explain a trained classifier on a raw record.
//!
//! The first window of the first record is scored, its saliency computed for
//! the record's own label, and the result rendered over the leads.

pub mod colormap;
pub mod render;
pub mod saliency;

use std::fs::create_dir_all;
use std::path::PathBuf;

use candle_core::Device;
use tracing::info;

use crate::config::{AppConfig, XaiConfig};
use crate::core::bandpass::signal_preprocessing;
use crate::dataset::{EcgSample, RecordLoader, SlicedEcgDataset, non_ecg_columns};
use crate::error::{EcgError, Result};
use crate::model::{EcgModel, ModelShape};

pub use colormap::inferno_r;
pub use render::{Normalize, draw_signal, draw_signal_with_interpretability, line_segments};
pub use saliency::{Attribution, saliency};

#[derive(Debug, Clone, PartialEq)]
pub struct XaiReport {
    pub record: String,
    pub label: u32,
    pub predicted: u32,
    pub saliency_png: PathBuf,
    pub signal_png: Option<PathBuf>,
    pub filtered_png: Option<PathBuf>,
}

/// Leads of one window alongside their absolute ECG gradients, batch axis
/// removed: both `[leads][samples]`.
pub struct SampleAttribution {
    pub predicted: u32,
    pub leads: Vec<Vec<f32>>,
    pub ecg_grads: Vec<Vec<f32>>,
}

/// Score `sample` and compute saliency for its label.
pub fn attribute_sample(model: &dyn EcgModel, sample: &EcgSample) -> Result<SampleAttribution> {
    let logits = model.forward(&sample.non_ecg, &sample.ecg)?;
    let predicted = logits.argmax(1)?.squeeze(0)?.to_scalar::<u32>()?;
    let attr = saliency(model, &sample.non_ecg, &sample.ecg, &sample.label)?;
    Ok(SampleAttribution {
        predicted,
        leads: sample.ecg.squeeze(0)?.to_vec2()?,
        ecg_grads: attr.ecg.squeeze(0)?.to_vec2()?,
    })
}

/// Render the saliency plot for `sample` into `xai.out_dir`; with
/// `preview`, also the raw and band-passed leads.
pub fn explain_sample(
    model: &dyn EcgModel,
    sample: &EcgSample,
    xai: &XaiConfig,
    preview: bool,
) -> Result<XaiReport> {
    let attribution = attribute_sample(model, sample)?;
    create_dir_all(&xai.out_dir)?;

    let (mut signal_png, mut filtered_png) = (None, None);
    if preview {
        let raw = xai.out_dir.join("signal.png");
        draw_signal(&raw, &attribution.leads, None)?;
        let filtered = xai.out_dir.join("signal_filtered.png");
        let fs = xai.sample_rate_hz;
        let band = (xai.bandpass_low_hz, xai.bandpass_high_hz);
        let filter = |lead: &[f32]| signal_preprocessing(lead, fs, band, xai.filter_order);
        draw_signal(&filtered, &attribution.leads, Some(&filter))?;
        signal_png = Some(raw);
        filtered_png = Some(filtered);
    }

    let saliency_png = xai.out_dir.join("saliency.png");
    draw_signal_with_interpretability(
        &saliency_png,
        &attribution.leads,
        &attribution.ecg_grads,
        xai.sample_rate_hz as f32,
        xai.line_width,
    )?;
    info!(
        record = %sample.name,
        label = sample.label_id,
        predicted = attribution.predicted,
        path = %saliency_png.display(),
        "saliency rendered"
    );

    Ok(XaiReport {
        record: sample.name.clone(),
        label: sample.label_id,
        predicted: attribution.predicted,
        saliency_png,
        signal_png,
        filtered_png,
    })
}

/// Non-ECG features a raw record carries.
const RECORD_FEATURES: [&str; 2] = ["gender", "age"];

/// Model shape for explaining raw records under `config`.
///
/// Records only carry gender and age, so a table layout that keeps extra
/// label columns as features cannot be explained.
pub fn record_model_shape(config: &AppConfig) -> Result<ModelShape> {
    let columns = non_ecg_columns(&config.data)?;
    if columns != RECORD_FEATURES {
        return Err(EcgError::Config(format!(
            "model features {columns:?} do not match record features {RECORD_FEATURES:?}; \
             list the extra columns in useless_columns"
        )));
    }
    Ok(ModelShape {
        non_ecg_dim: columns.len(),
        leads: config.data.leads,
        len: config.xai.slice_len,
        num_classes: config.training.num_classes,
    })
}

/// Load the configured record set and explain its first window.
pub fn launch_xai(model: &dyn EcgModel, config: &AppConfig, preview: bool) -> Result<XaiReport> {
    let xai = &config.xai;
    let records = RecordLoader::new(&config.data.record_dir, config.data.reference_path()).load(true)?;
    let dataset = SlicedEcgDataset::new(
        records,
        xai.slices_count,
        xai.slice_len,
        xai.slice_seed,
        &Device::Cpu,
    )?;
    if dataset.is_empty() {
        return Err(EcgError::Data(format!(
            "no records listed in {}",
            config.data.reference_path().display()
        )));
    }
    let sample = dataset.get(0)?;
    let expected = model.shape();
    if sample.ecg.dim(1)? != expected.leads {
        return Err(EcgError::Data(format!(
            "record {} has {} leads, model expects {}",
            sample.name,
            sample.ecg.dim(1)?,
            expected.leads
        )));
    }
    explain_sample(model, &sample, xai, preview)
}
