//! Staged, concurrent indexing pipeline.
//!
//! ```text
//! walk ──▶ hash & decide ──▶ chunk ──▶ embed ──▶ persist
//!  (1)      (N workers)     (N workers)  (1)       (1)
//! ```
//!
//! Stages are connected by bounded channels sized to the worker count, so a
//! slow stage throttles its producers. The hash stage drops files whose
//! bytes are identical to the previously indexed version; the persist stage
//! replaces a file's chunks and embeddings as one atomic group.
//!
//! Error policy: per-file read and parse failures are logged and skipped;
//! a persist failure is counted and the pipeline continues; an embedding
//! failure stops the embed stage and is surfaced with the partial stats.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::chunker::{Chunker, RawChunk};
use crate::embedder::Embedder;
use crate::error::Error;
use crate::languages::Registry;
use crate::models::{Chunk, FileRecord};
use crate::store::Store;
use crate::walker::{self, FileInfo};

/// Chunks per embedding request.
const EMBED_BATCH_SIZE: usize = 32;

/// Bound of the embed → persist queue.
const EMBEDDED_BUFFER: usize = 4;

/// Indexing results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Files discovered by the walk.
    pub files_total: usize,
    /// Files persisted this run.
    pub files_indexed: usize,
    /// Files dropped as unchanged.
    pub files_skipped: usize,
    /// Chunks persisted this run.
    pub chunks_total: usize,
}

/// Pipeline result: the stats it managed to gather, plus the first fatal
/// failure observed (walk, embed, or persist), if any.
pub struct Outcome {
    pub stats: Stats,
    pub failure: Option<Error>,
}

/// Progress callback `(phase, processed, total)`, invoked after each
/// successful persist.
pub type ProgressFn = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// A file that needs to be (re-)indexed.
struct FileWork {
    info: FileInfo,
    hash: String,
    language: String,
    src: Vec<u8>,
}

/// Chunks extracted from a single file.
struct ChunkBatch {
    work: FileWork,
    chunks: Vec<RawChunk>,
}

/// Chunks with their embeddings, ready to store.
struct EmbeddedBatch {
    work: FileWork,
    chunks: Vec<RawChunk>,
    vectors: Vec<Vec<f32>>,
}

/// Runs the full pipeline over the tree rooted at `root`.
pub async fn run_pipeline(
    root: &std::path::Path,
    store: &Store,
    registry: &Arc<Registry>,
    embedder: &Arc<dyn Embedder>,
    workers: usize,
    progress: Option<ProgressFn>,
) -> Outcome {
    let workers = workers.max(1);
    let files_total = Arc::new(AtomicUsize::new(0));

    // Stage 1: walk (only files with registered grammars).
    let (file_rx, walk_handle) = walker::walk(root.to_path_buf(), registry.extensions());

    // Stage 2: hash & decide (N workers).
    let file_rx = Arc::new(Mutex::new(file_rx));
    let (work_tx, work_rx) = mpsc::channel::<FileWork>(workers);
    let mut stage_tasks: Vec<JoinHandle<()>> = Vec::new();
    for _ in 0..workers {
        let file_rx = Arc::clone(&file_rx);
        let work_tx = work_tx.clone();
        let store = store.clone();
        let registry = Arc::clone(registry);
        let files_total = Arc::clone(&files_total);
        stage_tasks.push(tokio::spawn(async move {
            loop {
                let info = { file_rx.lock().await.recv().await };
                let Some(info) = info else { break };
                files_total.fetch_add(1, Ordering::Relaxed);

                let src = match tokio::fs::read(&info.path).await {
                    Ok(src) => src,
                    Err(e) => {
                        eprintln!("warning: read {}: {e}", info.rel_path);
                        continue;
                    }
                };

                let mut hasher = Sha256::new();
                hasher.update(&src);
                let hash = format!("{:x}", hasher.finalize());

                if let Ok(existing) = store.get_file_hash(&info.rel_path).await {
                    if existing == hash {
                        continue; // unchanged
                    }
                }

                let language = registry.language_name(&info.rel_path).to_string();
                let work = FileWork { info, hash, language, src };
                if work_tx.send(work).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(work_tx);

    // Stage 3: chunk (N workers).
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (chunk_tx, chunk_rx) = mpsc::channel::<ChunkBatch>(workers);
    for _ in 0..workers {
        let work_rx = Arc::clone(&work_rx);
        let chunk_tx = chunk_tx.clone();
        let registry = Arc::clone(registry);
        stage_tasks.push(tokio::spawn(async move {
            let chunker = Chunker::new(&registry);
            loop {
                let work = { work_rx.lock().await.recv().await };
                let Some(work) = work else { break };
                let chunks = match chunker.chunk(&work.info.rel_path, &work.src) {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        eprintln!("warning: {e}");
                        continue;
                    }
                };
                if chunks.is_empty() {
                    continue;
                }
                if chunk_tx.send(ChunkBatch { work, chunks }).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(chunk_tx);

    // Stage 4: embed (1 worker, sub-batches of EMBED_BATCH_SIZE).
    let (embedded_tx, mut embedded_rx) = mpsc::channel::<EmbeddedBatch>(EMBEDDED_BUFFER);
    let embed_handle: JoinHandle<Option<Error>> = {
        let embedder = Arc::clone(embedder);
        let mut chunk_rx = chunk_rx;
        tokio::spawn(async move {
            while let Some(batch) = chunk_rx.recv().await {
                let texts: Vec<String> =
                    batch.chunks.iter().map(|c| c.content.clone()).collect();

                let mut vectors = Vec::with_capacity(texts.len());
                for sub in texts.chunks(EMBED_BATCH_SIZE) {
                    match embedder.embed(sub).await {
                        Ok(mut embedded) => vectors.append(&mut embedded),
                        Err(e) => {
                            eprintln!("embed error {}: {e}", batch.work.info.rel_path);
                            return Some(e);
                        }
                    }
                }

                let out = EmbeddedBatch {
                    work: batch.work,
                    chunks: batch.chunks,
                    vectors,
                };
                if embedded_tx.send(out).await.is_err() {
                    return None;
                }
            }
            None
        })
    };

    // Stage 5: persist (1 worker).
    let persist_handle: JoinHandle<(usize, usize, Option<Error>)> = {
        let store = store.clone();
        let files_total = Arc::clone(&files_total);
        tokio::spawn(async move {
            let mut indexed = 0usize;
            let mut chunks_total = 0usize;
            let mut last_err: Option<Error> = None;

            while let Some(batch) = embedded_rx.recv().await {
                let rel_path = batch.work.info.rel_path.clone();
                let record = FileRecord {
                    path: rel_path.clone(),
                    hash: batch.work.hash.clone(),
                    language: batch.work.language.clone(),
                    size_bytes: batch.work.info.size as i64,
                };
                let chunks: Vec<Chunk> = batch.chunks.iter().map(to_store_chunk).collect();

                match store.persist_file(&record, &chunks, &batch.vectors).await {
                    Ok(_) => {
                        indexed += 1;
                        chunks_total += chunks.len();
                        if let Some(cb) = &progress {
                            cb("Indexing files...", indexed, files_total.load(Ordering::Relaxed));
                        }
                    }
                    Err(e) => {
                        eprintln!("persist error {rel_path}: {e}");
                        last_err = Some(Error::Persist(format!("{rel_path}: {e}")));
                    }
                }
            }

            (indexed, chunks_total, last_err)
        })
    };

    let (indexed, chunks_total, persist_err) =
        persist_handle.await.unwrap_or((0, 0, None));
    let embed_err = embed_handle.await.unwrap_or(None);
    for task in stage_tasks {
        let _ = task.await;
    }
    let walk_err = match walk_handle.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(join) => Some(Error::Config(format!("walk task failed: {join}"))),
    };

    let files_total = files_total.load(Ordering::Relaxed);
    let stats = Stats {
        files_total,
        files_indexed: indexed,
        files_skipped: files_total - indexed,
        chunks_total,
    };

    Outcome {
        stats,
        failure: walk_err.or(embed_err).or(persist_err),
    }
}

fn to_store_chunk(raw: &RawChunk) -> Chunk {
    Chunk {
        name: raw.name.clone(),
        kind: raw.kind.clone(),
        start_line: raw.start_line as i64,
        end_line: raw.end_line as i64,
        content: raw.content.clone(),
        ..Chunk::default()
    }
}
