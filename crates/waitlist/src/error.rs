use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::telemetry::TelemetryError;

/// Failures that stop a command from running to completion.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("invalid document file {path}: {reason}")]
    DocumentFile { path: String, reason: String },
}
