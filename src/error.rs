use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no ping data to export, run a test first")]
    NoData,

    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find config directory")]
    NoConfigDir,

    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("target host must not be empty")]
    EmptyTarget,

    #[error("ping interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),
}
