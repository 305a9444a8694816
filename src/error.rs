//! Error types shared by the training and XAI pipelines.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EcgError>;

#[derive(Error, Debug)]
pub enum EcgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("Invalid data: {0}")]
    Data(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
