use crate::error::Result;
use crate::model::ModelKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "DataConfig::default_table_path")]
    pub table_path: PathBuf,
    #[serde(default = "DataConfig::default_target_column")]
    pub target_column: String,
    #[serde(default = "DataConfig::default_useless_columns")]
    pub useless_columns: Vec<String>,
    #[serde(default = "DataConfig::default_columns_count")]
    pub columns_count: usize,
    #[serde(default = "DataConfig::default_leads")]
    pub leads: usize,
    #[serde(default = "DataConfig::default_test_size")]
    pub test_size: f64,
    #[serde(default = "DataConfig::default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "DataConfig::default_split_seed")]
    pub split_seed: u64,
    #[serde(default = "DataConfig::default_record_dir")]
    pub record_dir: PathBuf,
    #[serde(default = "DataConfig::default_reference_file")]
    pub reference_file: String,
}

impl DataConfig {
    fn default_table_path() -> PathBuf {
        PathBuf::from("data/half.csv")
    }
    fn default_target_column() -> String {
        "first_label".to_string()
    }
    fn default_useless_columns() -> Vec<String> {
        vec!["second_label".to_string(), "third_label".to_string()]
    }
    fn default_columns_count() -> usize {
        60_000
    }
    fn default_leads() -> usize {
        12
    }
    fn default_test_size() -> f64 {
        0.3
    }
    fn default_batch_size() -> usize {
        10_000
    }
    fn default_split_seed() -> u64 {
        42
    }
    fn default_record_dir() -> PathBuf {
        PathBuf::from("TrainingSet1")
    }
    fn default_reference_file() -> String {
        "REFERENCE.csv".to_string()
    }

    /// Full path of the record reference table.
    pub fn reference_path(&self) -> PathBuf {
        self.record_dir.join(&self.reference_file)
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            table_path: Self::default_table_path(),
            target_column: Self::default_target_column(),
            useless_columns: Self::default_useless_columns(),
            columns_count: Self::default_columns_count(),
            leads: Self::default_leads(),
            test_size: Self::default_test_size(),
            batch_size: Self::default_batch_size(),
            split_seed: Self::default_split_seed(),
            record_dir: Self::default_record_dir(),
            reference_file: Self::default_reference_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingConfig {
    #[serde(default = "TrainingConfig::default_lr")]
    pub lr: f64,
    #[serde(default = "TrainingConfig::default_epochs")]
    pub epochs: usize,
    #[serde(default = "TrainingConfig::default_print_every")]
    pub print_every: usize,
    #[serde(default = "TrainingConfig::default_num_classes")]
    pub num_classes: usize,
    #[serde(default)]
    pub model: ModelKind,
    #[serde(default = "TrainingConfig::default_step_size")]
    pub step_size: usize,
    #[serde(default = "TrainingConfig::default_gamma")]
    pub gamma: f64,
    #[serde(default = "TrainingConfig::default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "TrainingConfig::default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

impl TrainingConfig {
    fn default_lr() -> f64 {
        0.01
    }
    fn default_epochs() -> usize {
        50
    }
    fn default_print_every() -> usize {
        100
    }
    fn default_num_classes() -> usize {
        9
    }
    fn default_step_size() -> usize {
        2
    }
    fn default_gamma() -> f64 {
        0.1
    }
    fn default_log_dir() -> PathBuf {
        PathBuf::from("logs")
    }
    fn default_checkpoint_dir() -> PathBuf {
        PathBuf::from("checkpoints")
    }

    /// Checkpoint written at the end of training for `kind`.
    pub fn checkpoint_path(&self, kind: ModelKind) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{}.safetensors", kind.as_str()))
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            lr: Self::default_lr(),
            epochs: Self::default_epochs(),
            print_every: Self::default_print_every(),
            num_classes: Self::default_num_classes(),
            model: ModelKind::default(),
            step_size: Self::default_step_size(),
            gamma: Self::default_gamma(),
            log_dir: Self::default_log_dir(),
            checkpoint_dir: Self::default_checkpoint_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct XaiConfig {
    #[serde(default = "XaiConfig::default_sample_rate_hz")]
    pub sample_rate_hz: f64,
    #[serde(default = "XaiConfig::default_slices_count")]
    pub slices_count: usize,
    #[serde(default = "XaiConfig::default_slice_len")]
    pub slice_len: usize,
    #[serde(default = "XaiConfig::default_slice_seed")]
    pub slice_seed: u64,
    #[serde(default = "XaiConfig::default_bandpass_low_hz")]
    pub bandpass_low_hz: f64,
    #[serde(default = "XaiConfig::default_bandpass_high_hz")]
    pub bandpass_high_hz: f64,
    #[serde(default = "XaiConfig::default_filter_order")]
    pub filter_order: usize,
    #[serde(default = "XaiConfig::default_line_width")]
    pub line_width: u32,
    #[serde(default = "XaiConfig::default_out_dir")]
    pub out_dir: PathBuf,
}

impl XaiConfig {
    fn default_sample_rate_hz() -> f64 {
        500.0
    }
    fn default_slices_count() -> usize {
        10
    }
    // 5 s at 500 Hz
    fn default_slice_len() -> usize {
        2_500
    }
    fn default_slice_seed() -> u64 {
        42
    }
    fn default_bandpass_low_hz() -> f64 {
        1.0
    }
    fn default_bandpass_high_hz() -> f64 {
        40.0
    }
    fn default_filter_order() -> usize {
        2
    }
    fn default_line_width() -> u32 {
        3
    }
    fn default_out_dir() -> PathBuf {
        PathBuf::from("target/plots/xai")
    }
}

impl Default for XaiConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: Self::default_sample_rate_hz(),
            slices_count: Self::default_slices_count(),
            slice_len: Self::default_slice_len(),
            slice_seed: Self::default_slice_seed(),
            bandpass_low_hz: Self::default_bandpass_low_hz(),
            bandpass_high_hz: Self::default_bandpass_high_hz(),
            filter_order: Self::default_filter_order(),
            line_width: Self::default_line_width(),
            out_dir: Self::default_out_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub xai: XaiConfig,
}

impl AppConfig {
    /// Comment out every key so the written file documents the defaults
    /// without pinning them.
    fn commented_template(text: &str) -> String {
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
                commented.push_str(line);
                commented.push('\n');
            } else {
                commented.push_str("# ");
                commented.push_str(line);
                commented.push('\n');
            }
        }
        commented
    }

    /// Read and parse `path`; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path_obj = path.as_ref();
        if path_obj.exists() {
            return match Self::load(path_obj) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!(path = %path_obj.display(), %err, "failed to load config, using defaults");
                    Self::default()
                }
            };
        }

        // File does not exist: write defaults and return them.
        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path_obj, Self::commented_template(&text)) {
                    warn!(path = %path_obj.display(), %err, "failed to write default config");
                }
            }
            Err(err) => warn!(%err, "failed to serialize default config; continuing with defaults"),
        }
        default_cfg
    }
}
