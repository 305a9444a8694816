use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::model::ModelKind;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train a classifier on the wide ECG table
    Train(TrainArgs),
    /// Render gradient saliency for a trained classifier
    Xai(XaiArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Path to config TOML
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Learning rate (overrides config)
    #[arg(long)]
    pub lr: Option<f64>,

    /// Number of epochs (overrides config)
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Validate every N iterations (overrides config)
    #[arg(long)]
    pub print_every: Option<usize>,

    /// Number of classes (overrides config)
    #[arg(long)]
    pub num_classes: Option<usize>,

    /// Model architecture (overrides config)
    #[arg(long = "type", value_enum)]
    pub model: Option<ModelKind>,

    /// Wide CSV table (overrides config)
    #[arg(long)]
    pub table: Option<PathBuf>,
}

impl TrainArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        let tc = &mut config.training;
        if let Some(lr) = self.lr {
            tc.lr = lr;
        }
        if let Some(epochs) = self.epochs {
            tc.epochs = epochs;
        }
        if let Some(print_every) = self.print_every {
            tc.print_every = print_every;
        }
        if let Some(num_classes) = self.num_classes {
            tc.num_classes = num_classes;
        }
        if let Some(model) = self.model {
            tc.model = model;
        }
        if let Some(table) = &self.table {
            config.data.table_path = table.clone();
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct XaiArgs {
    /// Path to config TOML
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Model architecture of the checkpoint
    #[arg(long = "type", value_enum, default_value_t = ModelKind::Cnn)]
    pub model: ModelKind,

    /// Checkpoint to explain (default: <checkpoint_dir>/<TYPE>.safetensors)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Record directory holding the reference table (overrides config)
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Also render the raw and band-passed leads
    #[arg(long, default_value_t = false)]
    pub preview: bool,

    /// Number of classes of the checkpoint (overrides config)
    #[arg(long)]
    pub num_classes: Option<usize>,
}

impl XaiArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        config.training.model = self.model;
        if let Some(records) = &self.records {
            config.data.record_dir = records.clone();
        }
        if let Some(num_classes) = self.num_classes {
            config.training.num_classes = num_classes;
        }
    }

    pub fn checkpoint_path(&self, config: &AppConfig) -> PathBuf {
        self.checkpoint
            .clone()
            .unwrap_or_else(|| config.training.checkpoint_path(self.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_overrides_only_given_flags() {
        let cli = Cli::try_parse_from(["ecg-xai", "train", "--lr", "0.05", "--type", "CNN"]).unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train");
        };
        let mut cfg = AppConfig::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.training.lr, 0.05);
        assert_eq!(cfg.training.model, ModelKind::Cnn);
        assert_eq!(cfg.training.epochs, 50);
        assert_eq!(args.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn xai_defaults_to_cnn_checkpoint() {
        let cli = Cli::try_parse_from(["ecg-xai", "xai", "--records", "recs", "--preview"]).unwrap();
        let Command::Xai(args) = cli.command else {
            panic!("expected xai");
        };
        let mut cfg = AppConfig::default();
        args.apply(&mut cfg);
        assert!(args.preview);
        assert_eq!(cfg.data.record_dir, PathBuf::from("recs"));
        assert_eq!(
            args.checkpoint_path(&cfg),
            cfg.training.checkpoint_path(ModelKind::Cnn)
        );
    }

    #[test]
    fn unknown_model_type_is_rejected() {
        assert!(Cli::try_parse_from(["ecg-xai", "train", "--type", "RNN"]).is_err());
    }
}
