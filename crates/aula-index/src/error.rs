use std::path::PathBuf;

use aula_llm::LlmError;

use crate::document::DocumentError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(
        "invalid chunking: chunk_overlap ({chunk_overlap}) must be smaller than a non-zero chunk_size ({chunk_size})"
    )]
    InvalidChunking {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    #[error("no index found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("index at {} is unusable: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
