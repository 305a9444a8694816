pub mod cli;
pub mod config;
pub mod core;
pub mod dataset;
pub mod error;
pub mod model;
pub mod train;
pub mod xai;

pub use error::{EcgError, Result};
