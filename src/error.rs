/// Centralized error types for the processing pipeline
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    // Factory Errors (timeseries I/O)
    #[error("Factory error: {0}")]
    Factory(String),

    // Algorithm Errors
    #[error("Algorithm error: {0}")]
    Algorithm(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Metadata Errors
    #[error("Unknown station: {0}")]
    UnknownStation(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    // Streaming Errors
    #[error("Streaming error: {0}")]
    Streaming(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    // Generic Errors
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Check if error is recoverable (caller may retry the run)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Factory(_) | PipelineError::FileError(_)
        )
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            PipelineError::Factory(_) => "FACTORY_001",
            PipelineError::Algorithm(_) => "ALGO_001",
            PipelineError::Config(_) => "CFG_001",
            PipelineError::InvalidParameter(_) => "CFG_002",
            PipelineError::UnknownStation(_) => "META_001",
            PipelineError::Metadata(_) => "META_002",
            PipelineError::Streaming(_) => "STREAM_001",
            PipelineError::FileError(_) => "FILE_001",
            PipelineError::DeserializationError(_) => "DATA_001",
            PipelineError::Internal(_) => "INT_001",
        }
    }
}
