//! Core data models for the index store.
//!
//! The data lifecycle is:
//!
//! ```text
//! Walker → FileInfo → hash → Chunker → RawChunk → embed → Store
//!                                                    ↓
//!                                    search() → SearchResult
//! ```

use chrono::NaiveDateTime;

/// An indexed source file, keyed by its repo-relative path.
#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    /// Repo-relative path (unique).
    pub path: String,
    /// Hex SHA-256 of the raw on-disk bytes at indexing time.
    pub hash: String,
    /// Detected language name, or "".
    pub language: String,
    /// Size in bytes.
    pub size_bytes: i64,
}

/// A parsed code chunk as stored in the `chunks` table.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub id: i64,
    pub file_id: i64,
    /// Symbol name, possibly "".
    pub name: String,
    /// Grammar node type string.
    pub kind: String,
    /// 1-based inclusive start line.
    pub start_line: i64,
    /// 1-based inclusive end line.
    pub end_line: i64,
    /// Enriched content (header + source lines).
    pub content: String,
    /// Opaque JSON metadata blob, defaulting to `{}`.
    pub metadata: String,
}

/// A lightweight file row for listings and overview generation.
#[derive(Debug, Clone)]
pub struct FileListing {
    pub path: String,
    pub language: String,
    pub chunks: i64,
    pub summary: String,
    pub indexed_at: NaiveDateTime,
}

/// A named chunk row for overview generation.
#[derive(Debug, Clone)]
pub struct SymbolListing {
    pub name: String,
    pub kind: String,
    pub file_path: String,
}

/// A chunk with its similarity score and file context.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub file_path: String,
    pub language: String,
    /// Vector distance (ascending = closer) or lexical rank for FTS hits.
    pub distance: f64,
}
