//! Error types shared across the indexing and retrieval pipeline.
//!
//! Each component reports failures through the closed [`Error`] set so the
//! CLI boundary can decide what is fatal and what is merely logged. The
//! pipeline is best-effort at file granularity (`Parse`, `Persist`) and
//! strict about embedding identity (`Embed`, `DimensionMismatch`).

use std::path::PathBuf;

use thiserror::Error;

/// Embedding vector dimension. Every vector written to the store must have
/// exactly this many components.
pub const EMBEDDING_DIM: usize = 768;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Config(String),

    #[error("read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("embedding failed: {0}")]
    Embed(String),

    #[error("chat generation failed: {0}")]
    Chat(String),

    #[error("persist failed: {0}")]
    Persist(String),

    #[error("retrieval failed: {0}")]
    Retrieve(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
