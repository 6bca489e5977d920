//! Error types for the book engine
//!
//! Per-event soft failures (full registry, duplicate add, unknown order) are
//! not errors; they are reported through `EventOutcome`.

use thiserror::Error;

/// Book engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to parse event: {0}")]
    ParseError(String),

    #[error("Invalid engine parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Event channel closed")]
    ChannelClosed,
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IoError(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for EngineError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
