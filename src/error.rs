//! Error types for setup and IO paths.
//!
//! The simulation tick itself never fails; these errors only surface from
//! world construction, configuration loading and export writers.

use thiserror::Error;

/// Errors surfaced to the external driver.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid world size {width}x{height}: both sides must be finite and positive")]
    InvalidWorldSize { width: f32, height: f32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid genealogy export: {0}")]
    InvalidExport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
