//! SQLite-backed persistence for files, chunks, embeddings, and metadata.
//!
//! A single database file holds three cooperating tables plus one virtual
//! table:
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `files` | One row per indexed file (path, hash, language, summary) |
//! | `chunks` | Semantic chunks with line ranges and enriched content |
//! | `vec_chunks` | Embedding vectors as little-endian f32 BLOBs |
//! | `chunks_fts` | FTS5 index over chunk `name` and `content` (BM25) |
//! | `meta` | Free-form key/value strings (e.g. `embedding_model`) |
//!
//! The chunk→file relationship cascades on delete; `vec_chunks` cascades
//! from `chunks`; the FTS index is kept synchronized by insert/delete
//! triggers on `chunks`. Vector similarity is a brute-force cosine scan
//! over the stored BLOBs, which preserves the search contract without a
//! native vector extension.
//!
//! All per-file writes go through [`Store::persist_file`], which replaces a
//! file's chunks and embeddings in a single transaction so concurrent
//! readers see either the old chunk set or the new one, never a mix.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection};

use crate::error::{Error, Result, EMBEDDING_DIM};
use crate::models::{Chunk, FileListing, FileRecord, SearchResult, SymbolListing};

/// Handle to the index database. Cloning is cheap (shared pool).
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Creates or opens the database at `db_path` and bootstraps the schema.
    /// The parent directory is created if missing; the database is opened
    /// with WAL journaling and foreign-key enforcement.
    pub async fn open(db_path: &Path) -> Result<Store> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        init_schema(&pool).await?;
        Ok(Store { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Returns the stored hash for a path, or "" if the path is not indexed.
    pub async fn get_file_hash(&self, path: &str) -> Result<String> {
        let hash: Option<String> = sqlx::query_scalar("SELECT hash FROM files WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash.unwrap_or_default())
    }

    /// Inserts or updates a file record and returns its id. An update
    /// deletes the file's existing chunks (cascading to embeddings and
    /// the lexical index).
    pub async fn upsert_file(&self, record: &FileRecord) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = upsert_file_tx(&mut *tx, record).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Inserts chunks for a file in one transaction, returning their
    /// assigned ids in input order. The lexical index is populated by the
    /// insert trigger.
    pub async fn insert_chunks(&self, file_id: i64, chunks: &[Chunk]) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let ids = insert_chunks_tx(&mut *tx, file_id, chunks).await?;
        tx.commit().await?;
        Ok(ids)
    }

    /// Bulk-inserts embeddings keyed by chunk id. Fails fast when lengths
    /// differ or any vector's dimension is not [`EMBEDDING_DIM`].
    pub async fn insert_embeddings(&self, chunk_ids: &[i64], vectors: &[Vec<f32>]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_embeddings_tx(&mut *tx, chunk_ids, vectors).await?;
        tx.commit().await?;
        Ok(())
    }

    /// The pipeline's atomic per-file group: upsert the file record, insert
    /// its chunks, and insert their embeddings in a single transaction.
    /// Returns the file id and assigned chunk ids.
    pub async fn persist_file(
        &self,
        record: &FileRecord,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<(i64, Vec<i64>)> {
        let mut tx = self.pool.begin().await?;
        let file_id = upsert_file_tx(&mut *tx, record).await?;
        let chunk_ids = insert_chunks_tx(&mut *tx, file_id, chunks).await?;
        insert_embeddings_tx(&mut *tx, &chunk_ids, vectors).await?;
        tx.commit().await?;
        Ok((file_id, chunk_ids))
    }

    /// Finds the `k` chunks whose vectors are closest to `query_vec` by
    /// cosine distance, each joined with its file's path and language.
    pub async fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT v.chunk_id, v.embedding,
                   c.file_id, c.name, c.kind, c.start_line, c.end_line, c.content, c.metadata,
                   f.path, f.language
            FROM vec_chunks v
            JOIN chunks c ON c.id = v.chunk_id
            JOIN files f ON f.id = c.file_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results: Vec<SearchResult> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let distance = 1.0 - f64::from(cosine_similarity(query_vec, &stored));
                SearchResult {
                    chunk: chunk_from_row(row, "chunk_id"),
                    file_path: row.get("path"),
                    language: row.get("language"),
                    distance,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    /// Returns up to `k` chunks whose name or content match the lexical
    /// query, best BM25 rank first. Malformed queries yield an empty
    /// result rather than an error.
    pub async fn fts_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.file_id, c.name, c.kind, c.start_line, c.end_line, c.content, c.metadata,
                   f.path, f.language, rank
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.rowid
            JOIN files f ON f.id = c.file_id
            WHERE chunks_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            // FTS5 rejects queries with unbalanced quotes or stray
            // operators; treat those as "no matches".
            Err(_) => return Ok(Vec::new()),
        };

        Ok(rows
            .iter()
            .map(|row| SearchResult {
                chunk: chunk_from_row(row, "id"),
                file_path: row.get("path"),
                language: row.get("language"),
                distance: row.get::<f64, _>("rank"),
            })
            .collect())
    }

    /// Snapshot of all indexed files with language, chunk count, and summary.
    pub async fn list_files(&self) -> Result<Vec<FileListing>> {
        let rows = sqlx::query(
            r#"
            SELECT f.path, f.language, f.summary, f.indexed_at, COUNT(c.id) AS chunks
            FROM files f
            LEFT JOIN chunks c ON c.file_id = f.id
            GROUP BY f.id
            ORDER BY f.path
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| FileListing {
                path: row.get("path"),
                language: row.get("language"),
                chunks: row.get("chunks"),
                summary: row.get("summary"),
                indexed_at: row.get("indexed_at"),
            })
            .collect())
    }

    /// Looks up a single file's listing row by path.
    pub async fn get_file(&self, path: &str) -> Result<Option<FileListing>> {
        let row = sqlx::query(
            r#"
            SELECT f.path, f.language, f.summary, f.indexed_at, COUNT(c.id) AS chunks
            FROM files f
            LEFT JOIN chunks c ON c.file_id = f.id
            WHERE f.path = ?
            GROUP BY f.id
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| FileListing {
            path: row.get("path"),
            language: row.get("language"),
            chunks: row.get("chunks"),
            summary: row.get("summary"),
            indexed_at: row.get("indexed_at"),
        }))
    }

    /// All named chunks, for overview synthesis.
    pub async fn list_top_chunks(&self) -> Result<Vec<SymbolListing>> {
        let rows = sqlx::query(
            r#"
            SELECT c.name, c.kind, f.path
            FROM chunks c
            JOIN files f ON f.id = c.file_id
            WHERE c.name != ''
            ORDER BY f.path, c.start_line
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SymbolListing {
                name: row.get("name"),
                kind: row.get("kind"),
                file_path: row.get("path"),
            })
            .collect())
    }

    /// Reassembles a file's indexed content by concatenating its chunks'
    /// enriched bodies in line order.
    pub async fn get_all_file_content(&self, path: &str) -> Result<String> {
        let contents: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT c.content
            FROM chunks c
            JOIN files f ON f.id = c.file_id
            WHERE f.path = ?
            ORDER BY c.start_line, c.id
            "#,
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;
        Ok(contents.join("\n\n"))
    }

    pub async fn set_file_summary(&self, path: &str, summary: &str) -> Result<()> {
        sqlx::query("UPDATE files SET summary = ? WHERE path = ?")
            .bind(summary)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns a metadata value by key, or "" if not set.
    pub async fn get_meta(&self, key: &str) -> Result<String> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or_default())
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes all files, chunks, and embeddings in one transaction. Used
    /// by the model-change purge.
    pub async fn delete_all_chunks(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM vec_chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM files").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_file_tx(conn: &mut SqliteConnection, record: &FileRecord) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM files WHERE path = ?")
        .bind(&record.path)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) => {
            // Dropping the chunks cascades to vec_chunks and fires the FTS
            // delete trigger.
            sqlx::query("DELETE FROM chunks WHERE file_id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            sqlx::query(
                "UPDATE files SET hash = ?, language = ?, size_bytes = ?, \
                 indexed_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(&record.hash)
            .bind(&record.language)
            .bind(record.size_bytes)
            .bind(id)
            .execute(&mut *conn)
            .await?;
            Ok(id)
        }
        None => {
            let result = sqlx::query(
                "INSERT INTO files (path, hash, language, size_bytes) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.path)
            .bind(&record.hash)
            .bind(&record.language)
            .bind(record.size_bytes)
            .execute(&mut *conn)
            .await?;
            Ok(result.last_insert_rowid())
        }
    }
}

async fn insert_chunks_tx(
    conn: &mut SqliteConnection,
    file_id: i64,
    chunks: &[Chunk],
) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let metadata = if chunk.metadata.is_empty() {
            "{}"
        } else {
            chunk.metadata.as_str()
        };
        let result = sqlx::query(
            "INSERT INTO chunks (file_id, name, kind, start_line, end_line, content, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(file_id)
        .bind(&chunk.name)
        .bind(&chunk.kind)
        .bind(chunk.start_line)
        .bind(chunk.end_line)
        .bind(&chunk.content)
        .bind(metadata)
        .execute(&mut *conn)
        .await?;
        ids.push(result.last_insert_rowid());
    }
    Ok(ids)
}

async fn insert_embeddings_tx(
    conn: &mut SqliteConnection,
    chunk_ids: &[i64],
    vectors: &[Vec<f32>],
) -> Result<()> {
    if chunk_ids.len() != vectors.len() {
        return Err(Error::Persist(format!(
            "mismatched chunk ids ({}) and embeddings ({})",
            chunk_ids.len(),
            vectors.len()
        )));
    }
    for (chunk_id, vector) in chunk_ids.iter().zip(vectors) {
        if vector.len() != EMBEDDING_DIM {
            return Err(Error::DimensionMismatch {
                expected: EMBEDDING_DIM,
                got: vector.len(),
            });
        }
        sqlx::query("INSERT INTO vec_chunks (chunk_id, embedding) VALUES (?, ?)")
            .bind(chunk_id)
            .bind(vec_to_blob(vector))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn chunk_from_row(row: &sqlx::sqlite::SqliteRow, id_column: &str) -> Chunk {
    Chunk {
        id: row.get(id_column),
        file_id: row.get("file_id"),
        name: row.get("name"),
        kind: row.get("kind"),
        start_line: row.get("start_line"),
        end_line: row.get("end_line"),
        content: row.get("content"),
        metadata: row.get("metadata"),
    }
}

/// Creates missing tables and triggers. Safe to run on every open; a
/// pre-existing older schema without the `summary` column is migrated
/// in place.
async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            path       TEXT NOT NULL UNIQUE,
            hash       TEXT NOT NULL,
            language   TEXT NOT NULL DEFAULT '',
            size_bytes INTEGER NOT NULL DEFAULT 0,
            summary    TEXT NOT NULL DEFAULT '',
            indexed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id    INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            name       TEXT NOT NULL DEFAULT '',
            kind       TEXT NOT NULL DEFAULT '',
            start_line INTEGER NOT NULL,
            end_line   INTEGER NOT NULL,
            content    TEXT NOT NULL,
            metadata   TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vec_chunks (
            chunk_id  INTEGER PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 virtual table creation is not idempotent natively; check first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'chunks_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE chunks_fts USING fts5(
                name, content,
                content='chunks',
                content_rowid='id'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS chunks_fts_insert AFTER INSERT ON chunks BEGIN
            INSERT INTO chunks_fts(rowid, name, content) VALUES (new.id, new.name, new.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS chunks_fts_delete AFTER DELETE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, name, content)
            VALUES ('delete', old.id, old.name, old.content);
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id)")
        .execute(pool)
        .await?;

    // Older databases predate the summary column.
    let has_summary: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('files') WHERE name = 'summary'",
    )
    .fetch_one(pool)
    .await?;
    if has_summary == 0 {
        sqlx::query("ALTER TABLE files ADD COLUMN summary TEXT NOT NULL DEFAULT ''")
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Encodes a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decodes a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`. Returns 0.0 for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
