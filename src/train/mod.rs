//! Supervised training of the ECG classifiers.
//!
//! Plain SGD over mini-batches with a step-decay schedule applied once per
//! epoch. Every `print_every` iterations the model is scored on the
//! held-out split; training and validation scalars land in a per-run CSV.

pub mod scalars;
pub mod schedule;

use std::path::PathBuf;

use candle_core::{DType, Device};
use candle_nn::loss::cross_entropy;
use candle_nn::{Optimizer, SGD};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dataset::{BatchLoader, EcgTable, split};
use crate::error::{EcgError, Result};
use crate::model::{EcgModel, ModelKind, ModelShape, create_model, save_model};

pub use scalars::{ScalarPoint, ScalarWriter};
pub use schedule::StepLr;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainParams {
    pub lr: f64,
    pub epochs: usize,
    pub print_every: usize,
    pub step_size: usize,
    pub gamma: f64,
    pub seed: u64,
}

impl TrainParams {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lr: config.training.lr,
            epochs: config.training.epochs,
            print_every: config.training.print_every,
            step_size: config.training.step_size,
            gamma: config.training.gamma,
            seed: config.data.split_seed,
        }
    }
}

/// Loss and accuracy of the most recent validation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validation {
    pub step: usize,
    pub loss: f64,
    pub acc: f64,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub kind: ModelKind,
    pub steps: usize,
    pub last_validation: Option<Validation>,
    pub checkpoint: PathBuf,
    pub run_dir: PathBuf,
    pub scalars: Vec<ScalarPoint>,
}

/// Mean cross-entropy and accuracy over `loader`.
///
/// Both are averaged per batch, so a short final batch weighs as much as a
/// full one. An empty loader scores `(0, 0)`.
pub fn evaluate(model: &dyn EcgModel, loader: &BatchLoader) -> Result<(f64, f64)> {
    if loader.is_empty() {
        return Ok((0.0, 0.0));
    }
    let mut avg_loss = 0.0;
    let mut val_acc = 0.0;
    for batch in loader.iter() {
        let batch = batch?;
        let logits = model.forward(&batch.non_ecg, &batch.ecg)?.detach();
        let loss = cross_entropy(&logits, &batch.labels)?;
        let pred = logits.argmax(1)?;
        let acc = pred
            .eq(&batch.labels)?
            .to_dtype(DType::F32)?
            .mean_all()?
            .to_scalar::<f32>()?;
        avg_loss += loss.to_scalar::<f32>()? as f64;
        val_acc += acc as f64;
    }
    let n = loader.len() as f64;
    Ok((avg_loss / n, val_acc / n))
}

/// Run the epoch loop. Returns the last validation, if any ran.
pub fn fit(
    model: &dyn EcgModel,
    train_loader: &mut BatchLoader,
    test_loader: &BatchLoader,
    params: &TrainParams,
    writer: &mut ScalarWriter,
) -> Result<Option<Validation>> {
    if params.print_every == 0 {
        return Err(EcgError::Config("print_every must be positive".into()));
    }
    let mut optimizer = SGD::new(model.varmap().all_vars(), params.lr)?;
    let mut scheduler = StepLr::new(params.lr, params.step_size, params.gamma);
    let n_batches = train_loader.len();
    let mut last_validation = None;

    for e in 0..params.epochs {
        train_loader.reshuffle(params.seed, e);
        optimizer.set_learning_rate(scheduler.lr());

        for i in 0..n_batches {
            let batch = train_loader.batch(i)?;
            let out = model.forward(&batch.non_ecg, &batch.ecg)?;
            let loss = cross_entropy(&out, &batch.labels)?;
            optimizer.backward_step(&loss)?;

            let loss_val = loss.to_scalar::<f32>()? as f64;
            if !loss_val.is_finite() {
                warn!(epoch = e, iteration = i, "non-finite training loss");
            }
            let step = e * n_batches + i;
            writer.add_scalar("Train/Loss", loss_val, step)?;
            writer.add_scalar("Train/LR", optimizer.learning_rate(), step)?;

            if i % params.print_every == 0 {
                info!("Epoch: {e}, Iteration: {i}, Loss: {loss_val}");
                let (val_loss, val_acc) = evaluate(model, test_loader)?;
                info!("Epoch: {e}, Val Loss: {val_loss}, Val Acc: {val_acc}");
                writer.add_scalar("Val/Loss", val_loss, step)?;
                writer.add_scalar("Val/Acc", val_acc, step)?;
                last_validation = Some(Validation {
                    step,
                    loss: val_loss,
                    acc: val_acc,
                });
            }
        }
        scheduler.step();
        writer.flush()?;
    }
    Ok(last_validation)
}

/// Split `table`, train the configured model and write its checkpoint.
pub fn train(config: &AppConfig, table: &EcgTable) -> Result<TrainReport> {
    let tc = &config.training;
    if tc.print_every == 0 {
        return Err(EcgError::Config("print_every must be positive".into()));
    }
    let max_label = table.max_label()? as usize;
    if max_label >= tc.num_classes {
        return Err(EcgError::Config(format!(
            "label {} found but num_classes is {}",
            max_label + 1,
            tc.num_classes
        )));
    }

    let device: Device = table.labels.device().clone();
    let (mut train_loader, test_loader) = split(
        table,
        config.data.test_size,
        config.data.batch_size,
        config.data.split_seed,
    )?;

    let shape = ModelShape {
        non_ecg_dim: table.non_ecg_dim(),
        leads: table.leads(),
        len: table.samples_per_lead(),
        num_classes: tc.num_classes,
    };
    let model = create_model(tc.model, shape, &device)?;
    info!(
        model = %tc.model,
        lr = tc.lr,
        epochs = tc.epochs,
        batches = train_loader.len(),
        "starting training"
    );

    let mut writer = ScalarWriter::create(&tc.log_dir)?;
    let params = TrainParams::from_config(config);
    let last_validation = fit(model.as_ref(), &mut train_loader, &test_loader, &params, &mut writer)?;

    let checkpoint = tc.checkpoint_path(tc.model);
    save_model(model.as_ref(), &checkpoint)?;

    let run_dir = writer.run_dir().to_path_buf();
    Ok(TrainReport {
        kind: tc.model,
        steps: params.epochs * train_loader.len(),
        last_validation,
        checkpoint,
        run_dir,
        scalars: writer.into_history()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Tensor;
    use candle_nn::VarMap;

    /// Always predicts class 0 with the same confidence.
    struct ConstModel {
        varmap: VarMap,
    }

    impl EcgModel for ConstModel {
        fn kind(&self) -> ModelKind {
            ModelKind::Mlp
        }
        fn shape(&self) -> ModelShape {
            ModelShape {
                non_ecg_dim: 1,
                leads: 1,
                len: 1,
                num_classes: 2,
            }
        }
        fn varmap(&self) -> &VarMap {
            &self.varmap
        }
        fn forward(&self, non_ecg: &Tensor, _ecg: &Tensor) -> Result<Tensor> {
            let b = non_ecg.dim(0)?;
            let row = Tensor::new(&[[2.0f32, 0.0]], non_ecg.device())?;
            Ok(row.broadcast_as((b, 2))?.contiguous()?)
        }
    }

    fn loader(labels: &[u32], batch_size: usize) -> BatchLoader {
        let device = Device::Cpu;
        let n = labels.len();
        BatchLoader::new(
            Tensor::zeros((n, 1), DType::F32, &device).unwrap(),
            Tensor::zeros((n, 1, 1), DType::F32, &device).unwrap(),
            Tensor::new(labels, &device).unwrap(),
            batch_size,
        )
        .unwrap()
    }

    #[test]
    fn evaluate_averages_over_batches() {
        let model = ConstModel {
            varmap: VarMap::new(),
        };
        // Batches [0, 1] and [0]: accuracies 0.5 and 1.0.
        let (loss, acc) = evaluate(&model, &loader(&[0, 1, 0], 2)).unwrap();
        assert!((acc - 0.75).abs() < 1e-6, "acc={acc}");

        let p0 = (2.0f64.exp() / (2.0f64.exp() + 1.0)).ln();
        let p1 = (1.0 / (2.0f64.exp() + 1.0)).ln();
        let expected = (-(p0 + p1) / 2.0 + -p0) / 2.0;
        assert!((loss - expected).abs() < 1e-5, "loss={loss} expected={expected}");
    }

    #[test]
    fn fit_rejects_zero_print_every() {
        let model = ConstModel {
            varmap: VarMap::new(),
        };
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ScalarWriter::create_in(dir.path()).unwrap();
        let mut train_loader = loader(&[0, 1], 1);
        let params = TrainParams {
            lr: 0.1,
            epochs: 1,
            print_every: 0,
            step_size: 1,
            gamma: 1.0,
            seed: 0,
        };
        let err = fit(&model, &mut train_loader, &loader(&[0], 1), &params, &mut writer);
        assert!(matches!(err, Err(EcgError::Config(_))));
    }
}
