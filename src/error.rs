//! Typed errors for the loader and the station configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{resource} is missing required column `{column}`")]
    MissingColumn {
        resource: String,
        column: &'static str,
    },
    #[error("unsupported archive format: {}", .0.display())]
    UnsupportedArchive(PathBuf),
    #[error("no archive files found in {}", .0.display())]
    NoArchives(PathBuf),
    #[error("headway dataset not found at {}", .0.display())]
    DatasetMissing(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("station `{0}` has no target stop ids")]
    EmptyStopSet(String),
    #[error("station `{0}` has an empty stop id")]
    EmptyStopId(String),
}
