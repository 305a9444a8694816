use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use candle_core::Device;
use ecg_xai::EcgError;
use ecg_xai::config::AppConfig;
use ecg_xai::dataset::{RecordLoader, SlicedEcgDataset};
use ecg_xai::model::{ModelKind, ModelShape, create_model, load_model, save_model};
use ecg_xai::xai::{attribute_sample, launch_xai};

const LEADS: usize = 3;
const SAMPLES: usize = 600;
const SLICE: usize = 200;

fn write_records(dir: &Path) {
    fs::write(
        dir.join("REFERENCE.csv"),
        "Recording,First_label,Second_label,Third_label\nA0001,2,,\nA0002,4,1,\n",
    )
    .unwrap();
    for (name, meta, f) in [("A0001", "Male,61", 1.1f32), ("A0002", "Female,48", 1.7)] {
        let mut text = format!("{meta}\n");
        for lead in 0..LEADS {
            let row: Vec<String> = (0..SAMPLES)
                .map(|i| {
                    let t = i as f32 / 500.0;
                    format!("{:.4}", (2.0 * std::f32::consts::PI * f * t).sin() * (lead + 1) as f32)
                })
                .collect();
            writeln!(text, "{}", row.join(",")).unwrap();
        }
        fs::write(dir.join(format!("{name}.csv")), text).unwrap();
    }
}

fn shape(leads: usize) -> ModelShape {
    ModelShape {
        non_ecg_dim: 2,
        leads,
        len: SLICE,
        num_classes: 9,
    }
}

#[test]
fn restored_checkpoint_explains_first_window() {
    let dir = tempfile::tempdir().unwrap();
    write_records(dir.path());

    let checkpoint = dir.path().join("CNN.safetensors");
    let trained = create_model(ModelKind::Cnn, shape(LEADS), &Device::Cpu).unwrap();
    save_model(trained.as_ref(), &checkpoint).unwrap();
    let model = load_model(ModelKind::Cnn, shape(LEADS), &checkpoint, &Device::Cpu).unwrap();

    let records = RecordLoader::new(dir.path(), dir.path().join("REFERENCE.csv"))
        .load(true)
        .unwrap();
    let dataset = SlicedEcgDataset::new(records, 10, SLICE, 42, &Device::Cpu).unwrap();
    assert_eq!(dataset.len(), 20);

    let sample = dataset.get(0).unwrap();
    assert_eq!(sample.name, "A0001");
    assert_eq!(sample.label_id, 1);

    let from_trained = attribute_sample(trained.as_ref(), &sample).unwrap();
    let from_restored = attribute_sample(model.as_ref(), &sample).unwrap();
    assert_eq!(from_trained.predicted, from_restored.predicted);
    assert_eq!(from_restored.ecg_grads.len(), LEADS);
    for (a, b) in from_trained.ecg_grads.iter().zip(&from_restored.ecg_grads) {
        assert_eq!(a.len(), SLICE);
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}

#[test]
fn launch_with_preview_renders_all_figures() {
    let dir = tempfile::tempdir().unwrap();
    write_records(dir.path());
    let mut cfg = AppConfig::default();
    cfg.data.record_dir = dir.path().to_path_buf();
    cfg.xai.slice_len = SLICE;
    cfg.xai.out_dir = dir.path().join("plots");

    let model = create_model(ModelKind::Cnn, shape(LEADS), &Device::Cpu).unwrap();
    let report = launch_xai(model.as_ref(), &cfg, true).unwrap();

    assert_eq!(report.record, "A0001");
    assert_eq!(report.label, 1);
    assert!(report.predicted < 9);
    assert_eq!(report.saliency_png, cfg.xai.out_dir.join("saliency.png"));
    let signal = report.signal_png.clone().unwrap();
    let filtered = report.filtered_png.clone().unwrap();
    assert_eq!(signal, cfg.xai.out_dir.join("signal.png"));
    assert_eq!(filtered, cfg.xai.out_dir.join("signal_filtered.png"));
    for path in [&report.saliency_png, &signal, &filtered] {
        let meta = fs::metadata(path).unwrap();
        assert!(meta.len() > 0, "{} is empty", path.display());
    }
}

#[test]
fn launch_without_preview_renders_saliency_only() {
    let dir = tempfile::tempdir().unwrap();
    write_records(dir.path());
    let mut cfg = AppConfig::default();
    cfg.data.record_dir = dir.path().to_path_buf();
    cfg.xai.slice_len = SLICE;
    cfg.xai.out_dir = dir.path().join("plots");

    let model = create_model(ModelKind::Cnn, shape(LEADS), &Device::Cpu).unwrap();
    let report = launch_xai(model.as_ref(), &cfg, false).unwrap();
    assert!(report.saliency_png.exists());
    assert!(report.signal_png.is_none() && report.filtered_png.is_none());
    assert!(!cfg.xai.out_dir.join("signal.png").exists());
}

#[test]
fn launch_rejects_lead_count_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    write_records(dir.path());
    let mut cfg = AppConfig::default();
    cfg.data.record_dir = dir.path().to_path_buf();
    cfg.xai.slice_len = SLICE;
    cfg.xai.out_dir = dir.path().join("plots");

    let model = create_model(ModelKind::Cnn, shape(12), &Device::Cpu).unwrap();
    let err = launch_xai(model.as_ref(), &cfg, false);
    assert!(matches!(err, Err(EcgError::Data(_))));
    assert!(!cfg.xai.out_dir.exists());
}

#[test]
fn launch_without_reference_table_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.data.record_dir = dir.path().join("missing");
    let model = create_model(ModelKind::Cnn, shape(LEADS), &Device::Cpu).unwrap();
    assert!(launch_xai(model.as_ref(), &cfg, false).is_err());
}
