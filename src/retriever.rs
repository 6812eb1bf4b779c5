//! Hybrid retrieval: keyword and vector search merged into one ranked list.
//!
//! Lexical (BM25) hits come first because exact identifier matches are the
//! strongest signal for code questions; vector hits fill in paraphrased
//! queries. Results are deduplicated by chunk id and truncated to `k`.

use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::models::SearchResult;
use crate::store::Store;

/// Runs both FTS keyword search and vector similarity search, then merges
/// with lexical matches first. Lexical errors are recovered as empty
/// results; an embedding or vector-search failure is fatal.
pub async fn hybrid_retrieve(
    query: &str,
    store: &Store,
    embedder: &dyn Embedder,
    k: usize,
) -> Result<Vec<SearchResult>> {
    let fts_results = store.fts_search(query, k).await.unwrap_or_default();

    let query_vec = embedder
        .embed_single(query)
        .await
        .map_err(|e| Error::Retrieve(format!("embed query: {e}")))?;
    let vec_results = store
        .search(&query_vec, k)
        .await
        .map_err(|e| Error::Retrieve(format!("vector search: {e}")))?;

    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::with_capacity(k);
    for result in fts_results.into_iter().chain(vec_results) {
        if seen.insert(result.chunk.id) {
            merged.push(result);
        }
    }
    merged.truncate(k);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EMBEDDING_DIM;
    use crate::models::{Chunk, FileRecord};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Deterministic embedder: one basis component per distinct text.
    struct FakeEmbedder;

    fn fake_vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        let idx = text.bytes().map(usize::from).sum::<usize>() % EMBEDDING_DIM;
        v[idx] = 1.0;
        v
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| fake_vector(t)).collect())
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    fn chunk(name: &str, content: &str, line: i64) -> Chunk {
        Chunk {
            name: name.to_string(),
            kind: "function_declaration".to_string(),
            start_line: line,
            end_line: line,
            content: content.to_string(),
            ..Chunk::default()
        }
    }

    async fn seeded_store(tmp: &TempDir) -> Store {
        let store = Store::open(&tmp.path().join("index.db")).await.unwrap();
        let record = FileRecord {
            path: "auth.go".into(),
            hash: "h".into(),
            language: "go".into(),
            size_bytes: 1,
        };
        let chunks = vec![
            chunk("AuthMiddleware", "func AuthMiddleware() {}", 1),
            chunk("LoginFlow", "session token exchange", 10),
            chunk("Render", "func Render() {}", 20),
        ];
        let vectors = vec![
            fake_vector("func AuthMiddleware() {}"),
            fake_vector("login flow"),
            fake_vector("unrelated"),
        ];
        store.persist_file(&record, &chunks, &vectors).await.unwrap();
        store
    }

    #[tokio::test]
    async fn lexical_hits_come_first_and_dedup_applies() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(&tmp).await;

        // "AuthMiddleware" matches lexically; the vector scan also returns
        // it, so dedup must collapse the two.
        let results = hybrid_retrieve("AuthMiddleware", &store, &FakeEmbedder, 3)
            .await
            .unwrap();

        assert_eq!(results[0].chunk.name, "AuthMiddleware");
        let mut ids: Vec<i64> = results.iter().map(|r| r.chunk.id).collect();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before, "duplicate chunk id in hybrid results");
        assert!(results.len() <= 3);
    }

    #[tokio::test]
    async fn vector_hits_fill_in_for_paraphrased_queries() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(&tmp).await;

        // No lexical match for the paraphrase, but the fake vector lines up
        // with the LoginFlow chunk.
        let results = hybrid_retrieve("login flow", &store, &FakeEmbedder, 2)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.name, "LoginFlow");
    }

    #[tokio::test]
    async fn malformed_lexical_query_falls_back_to_vectors() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(&tmp).await;

        let results = hybrid_retrieve("\"((broken", &store, &FakeEmbedder, 3)
            .await
            .unwrap();
        assert!(results.len() <= 3);
        assert!(!results.is_empty());
    }
}
