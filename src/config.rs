//! Indexer configuration assembled from CLI flags.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
/// Default generative model for chat and summaries.
pub const DEFAULT_CHAT_MODEL: &str = "qwen3:8b";
/// Default number of retrieved chunks per question.
pub const DEFAULT_K: usize = 10;

/// Runtime configuration for indexing, retrieval, and chat.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite index database.
    pub db_path: PathBuf,
    /// Base URL of the Ollama instance.
    pub ollama_url: String,
    /// Embedding model name.
    pub embed_model: String,
    /// Generative model for chat.
    pub chat_model: String,
    /// Model used for file summaries and the project overview.
    pub overview_model: String,
    /// Parallel workers for the hash and chunk stages. 0 means CPU count.
    pub workers: usize,
    /// Number of chunks retrieved per question.
    pub k: usize,
}

impl Config {
    /// Default database location for a project root: `<root>/.synapse/index.db`.
    pub fn default_db_path(root: &Path) -> PathBuf {
        root.join(".synapse").join("index.db")
    }

    /// Resolves `workers == 0` to the number of available CPUs.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.embed_model.is_empty() {
            return Err(Error::Config("embedding model must not be empty".into()));
        }
        if self.ollama_url.is_empty() {
            return Err(Error::Config("ollama URL must not be empty".into()));
        }
        if self.k == 0 {
            return Err(Error::Config("k must be >= 1".into()));
        }
        Ok(())
    }

    /// Fails with a configuration error when the index database is missing.
    /// Used by `chat` and `mcp`, which never create an index themselves.
    pub fn require_index(&self) -> Result<()> {
        if !self.db_path.exists() {
            return Err(Error::Config(format!(
                "index not found at {}\nRun 'synapse index <path>' first to build the index",
                self.db_path.display()
            )));
        }
        Ok(())
    }
}
