use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("structured output validation failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<RagError>,
    },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether the structured-output loop may recover from this error by asking again
    #[inline]
    pub const fn is_correctable(&self) -> bool {
        matches!(self, Self::MalformedData(_) | Self::SchemaViolation(_))
    }
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod indexer;
pub mod providers;
pub mod rag;
pub mod structured;
pub mod vector_store;
