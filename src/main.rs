// Entry point: trains a classifier or renders saliency for a trained one.
use std::process::ExitCode;

use candle_core::Device;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ecg_xai::cli::{Cli, Command, TrainArgs, XaiArgs};
use ecg_xai::config::AppConfig;
use ecg_xai::dataset::load_table;
use ecg_xai::model::load_model;
use ecg_xai::train::train;
use ecg_xai::xai::{launch_xai, record_model_shape};

fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn run_train(args: &TrainArgs) -> ecg_xai::Result<()> {
    let mut config = AppConfig::load_or_default(&args.config);
    args.apply(&mut config);
    let table = load_table(&config.data.table_path, &config.data, &Device::Cpu)?;
    let report = train(&config, &table)?;
    info!(
        model = %report.kind,
        steps = report.steps,
        checkpoint = %report.checkpoint.display(),
        scalars = %report.run_dir.display(),
        "training finished"
    );
    if let Some(v) = report.last_validation {
        info!("Final Val Loss: {}, Val Acc: {}", v.loss, v.acc);
    }
    Ok(())
}

fn run_xai(args: &XaiArgs) -> ecg_xai::Result<()> {
    let mut config = AppConfig::load_or_default(&args.config);
    args.apply(&mut config);
    let shape = record_model_shape(&config)?;
    let model = load_model(args.model, shape, args.checkpoint_path(&config), &Device::Cpu)?;
    let report = launch_xai(model.as_ref(), &config, args.preview)?;
    println!(
        "{}: label {} predicted {} -> {}",
        report.record,
        report.label + 1,
        report.predicted + 1,
        report.saliency_png.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Train(args) => run_train(args),
        Command::Xai(args) => run_xai(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "aborted");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
