use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use candle_core::Device;
use ecg_xai::EcgError;
use ecg_xai::config::AppConfig;
use ecg_xai::dataset::load_table;
use ecg_xai::model::{ModelKind, ModelShape, load_model};
use ecg_xai::train::{evaluate, train};

const LEADS: usize = 2;
const PER_LEAD: usize = 16;
const ROWS: usize = 40;

/// Class 1 rows ramp up, class 2 rows ramp down; labels are 1-based.
fn write_table(path: &Path) {
    let mut text = String::new();
    for r in 0..ROWS {
        let label = 1 + r % 2;
        let sign = if label == 1 { 1.0 } else { -1.0 };
        let gender = if r % 3 == 0 { "Male" } else { "Female" };
        write!(text, "{gender},0.{},{label},,", r % 10).unwrap();
        for c in 0..LEADS * PER_LEAD {
            let v = sign * (1.0 + (c % PER_LEAD) as f32 * 0.1) + (r as f32 * 0.01);
            write!(text, ",{v}").unwrap();
        }
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

fn config(dir: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.data.table_path = dir.join("table.csv");
    cfg.data.columns_count = LEADS * PER_LEAD;
    cfg.data.leads = LEADS;
    cfg.data.test_size = 0.25;
    cfg.data.batch_size = 4;
    cfg.training.lr = 0.05;
    cfg.training.epochs = 5;
    cfg.training.print_every = 2;
    cfg.training.num_classes = 2;
    cfg.training.step_size = 2;
    cfg.training.gamma = 0.5;
    cfg.training.log_dir = dir.join("logs");
    cfg.training.checkpoint_dir = dir.join("checkpoints");
    cfg
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[test]
fn mlp_learns_separable_classes_and_logs_scalars() {
    let dir = tempfile::tempdir().unwrap();
    write_table(&dir.path().join("table.csv"));
    let cfg = config(dir.path());
    let table = load_table(&cfg.data.table_path, &cfg.data, &Device::Cpu).unwrap();
    assert_eq!(table.rows(), ROWS);

    let report = train(&cfg, &table).unwrap();
    // 30 training rows in batches of 4.
    let batches = 8;
    assert_eq!(report.steps, cfg.training.epochs * batches);
    assert!(report.checkpoint.exists());
    assert_eq!(
        report.checkpoint,
        dir.path().join("checkpoints").join("MLP.safetensors")
    );

    let series = |tag: &str| -> Vec<(usize, f64)> {
        report
            .scalars
            .iter()
            .filter(|p| p.tag == tag)
            .map(|p| (p.step, p.value))
            .collect()
    };
    let losses: Vec<f64> = series("Train/Loss").into_iter().map(|(_, v)| v).collect();
    assert_eq!(losses.len(), report.steps);
    assert_eq!(series("Val/Loss").len(), cfg.training.epochs * batches / 2);
    assert!(
        mean(&losses[losses.len() - batches..]) < mean(&losses[..batches]),
        "loss did not decrease: {losses:?}"
    );

    // Step decay of 0.5 every 2 epochs.
    let lr = series("Train/LR");
    assert!((lr[0].1 - 0.05).abs() < 1e-9);
    assert!((lr[2 * batches].1 - 0.025).abs() < 1e-9);
    assert!((lr[4 * batches].1 - 0.0125).abs() < 1e-9);

    let last = report.last_validation.unwrap();
    assert!(last.acc > 0.5, "validation accuracy {}", last.acc);

    let csv = fs::read_to_string(report.run_dir.join("scalars.csv")).unwrap();
    assert!(csv.starts_with("tag,step,value"));
    assert_eq!(csv.lines().count(), report.scalars.len() + 1);
}

#[test]
fn cnn_checkpoint_restores_and_scores() {
    let dir = tempfile::tempdir().unwrap();
    write_table(&dir.path().join("table.csv"));
    let mut cfg = config(dir.path());
    cfg.training.model = ModelKind::Cnn;
    cfg.training.epochs = 2;
    let table = load_table(&cfg.data.table_path, &cfg.data, &Device::Cpu).unwrap();
    let report = train(&cfg, &table).unwrap();

    let shape = ModelShape {
        non_ecg_dim: table.non_ecg_dim(),
        leads: LEADS,
        len: PER_LEAD,
        num_classes: 2,
    };
    let restored = load_model(ModelKind::Cnn, shape, &report.checkpoint, &Device::Cpu).unwrap();
    let (_, test) = ecg_xai::dataset::split(
        &table,
        cfg.data.test_size,
        cfg.data.batch_size,
        cfg.data.split_seed,
    )
    .unwrap();
    let (loss, acc) = evaluate(restored.as_ref(), &test).unwrap();
    assert!(loss.is_finite());
    assert!((0.0..=1.0).contains(&acc));
}

#[test]
fn cnn_on_windows_shorter_than_its_receptive_field_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.data.columns_count = LEADS * 8;
    let mut text = String::new();
    for r in 0..ROWS {
        write!(text, "Male,0.5,{},,", 1 + r % 2).unwrap();
        for c in 0..LEADS * 8 {
            write!(text, ",{}", c as f32 * 0.1).unwrap();
        }
        text.push('\n');
    }
    fs::write(&cfg.data.table_path, text).unwrap();
    cfg.training.model = ModelKind::Cnn;

    let table = load_table(&cfg.data.table_path, &cfg.data, &Device::Cpu).unwrap();
    assert_eq!(table.samples_per_lead(), 8);
    assert!(matches!(train(&cfg, &table), Err(EcgError::Config(_))));
}

#[test]
fn zero_epochs_still_writes_a_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    write_table(&dir.path().join("table.csv"));
    let mut cfg = config(dir.path());
    cfg.training.epochs = 0;
    let table = load_table(&cfg.data.table_path, &cfg.data, &Device::Cpu).unwrap();
    let report = train(&cfg, &table).unwrap();
    assert_eq!(report.steps, 0);
    assert!(report.scalars.is_empty());
    assert!(report.last_validation.is_none());
    assert!(report.checkpoint.exists());
}

#[test]
fn labels_beyond_num_classes_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_table(&dir.path().join("table.csv"));
    let mut cfg = config(dir.path());
    cfg.training.num_classes = 1;
    let table = load_table(&cfg.data.table_path, &cfg.data, &Device::Cpu).unwrap();
    assert!(matches!(train(&cfg, &table), Err(EcgError::Config(_))));
    assert!(!cfg.training.checkpoint_dir.exists());
}
