//! Error taxonomy for save/recall.
//!
//! Every variant renders as a human-readable sentence that names the file,
//! path or parameter at fault, because the tool surface hands these strings
//! straight back to the calling agent.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used by the document store.
pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// An input path does not exist.
    #[error("File not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// No loader is registered for the file's extension.
    #[error(
        "Unsupported file type for {}: {} is not supported (supported: {})",
        .path.display(),
        describe_extension(.extension.as_deref()),
        .supported.join(", ")
    )]
    UnsupportedType {
        path: PathBuf,
        extension: Option<String>,
        supported: Vec<String>,
    },

    /// The loader failed to read or parse the file.
    #[error("Error processing {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// The embedding provider failed or returned malformed vectors.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The vector index rejected an operation.
    #[error("Vector index error: {0}")]
    Index(String),

    #[error(
        "Invalid chunking parameters: chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size}) and chunk_size must be > 0"
    )]
    InvalidChunking {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl MemoryError {
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        MemoryError::Embedding(err.to_string())
    }

    /// Wraps an index failure, keeping the full `anyhow` context chain.
    pub fn index(err: anyhow::Error) -> Self {
        MemoryError::Index(format!("{:#}", err))
    }
}

fn describe_extension(extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("file type '.{}'", ext),
        None => "a file without an extension".to_string(),
    }
}
