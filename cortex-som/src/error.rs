//! Error types for cortex-som

use thiserror::Error;

/// Errors raised by the streaming core
#[derive(Error, Debug)]
pub enum CortexError {
    /// Invalid construction parameters. Fatal, raised before the pipeline runs.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Feature and weight dimensionality disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Malformed or short chunk. The pipeline skips it and keeps going.
    #[error("Chunk error: {0}")]
    Chunk(String),

    #[error("Audio capture error: {0}")]
    Capture(String),

    #[error("Audio device error: {0}")]
    Device(String),

    /// The coordinator thread died before producing a report
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CortexError {
    /// Whether the error only affects a single chunk
    pub fn is_transient(&self) -> bool {
        matches!(self, CortexError::Chunk(_))
    }
}

pub type Result<T> = std::result::Result<T, CortexError>;
