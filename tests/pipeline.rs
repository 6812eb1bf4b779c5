//! End-to-end indexing tests over a temporary source tree, with
//! deterministic in-process service clients standing in for Ollama.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use synapse::chat::build_messages;
use synapse::config::Config;
use synapse::embedder::Embedder;
use synapse::error::{Result, EMBEDDING_DIM};
use synapse::indexer::Indexer;
use synapse::llm::{ChatClient, Message};
use synapse::pipeline::Stats;
use synapse::retriever::hybrid_retrieve;
use synapse::store::Store;

/// Embedder that derives a stable vector from the text bytes. Identical
/// text always embeds identically, so incrementality is observable.
struct FakeEmbedder;

fn fake_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    let sum: usize = text.bytes().map(usize::from).sum();
    v[sum % EMBEDDING_DIM] = 1.0;
    v[(sum / 7) % EMBEDDING_DIM] += 0.5;
    v
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| fake_vector(t)).collect())
    }

    fn model(&self) -> &str {
        "fake-embed"
    }
}

struct FakeChat;

#[async_trait]
impl ChatClient for FakeChat {
    async fn generate(&self, _messages: &[Message]) -> Result<String> {
        Ok("A small arithmetic module.".to_string())
    }
}

fn test_config(root: &Path, embed_model: &str) -> Config {
    Config {
        db_path: Config::default_db_path(root),
        ollama_url: "http://localhost:11434".to_string(),
        embed_model: embed_model.to_string(),
        chat_model: "qwen3:8b".to_string(),
        overview_model: "qwen3:8b".to_string(),
        workers: 2,
        k: 10,
    }
}

async fn make_indexer(root: &Path, embed_model: &str) -> Indexer {
    let config = test_config(root, embed_model);
    let store = Store::open(&config.db_path).await.unwrap();
    Indexer::with_clients(config, store, Arc::new(FakeEmbedder), Arc::new(FakeChat))
}

async fn index(indexer: &Indexer, root: &Path) -> Stats {
    let outcome = indexer.index(root, None).await.unwrap();
    assert!(outcome.failure.is_none(), "unexpected pipeline failure");
    outcome.stats
}

const GO_MAIN: &str =
    "package m\nfunc Add(a, b int) int { return a + b }\ntype T struct{ X int }\n";

#[tokio::test]
async fn fresh_index_of_one_go_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("main.go"), GO_MAIN).unwrap();

    let indexer = make_indexer(tmp.path(), "model-a").await;
    let stats = index(&indexer, tmp.path()).await;

    assert_eq!(stats.files_total, 1);
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_skipped, 0);
    assert_eq!(stats.chunks_total, 2);

    // A lexical search for the symbol returns the Add chunk first.
    let hits = indexer.store().fts_search("Add", 10).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.name, "Add");

    // Summaries and the overview blob were generated.
    let files = indexer.store().list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].summary, "A small arithmetic module.");
    let overview = fs::read_to_string(tmp.path().join(".synapse").join("overview.md")).unwrap();
    assert_eq!(overview, "A small arithmetic module.");

    assert_eq!(
        indexer.store().get_meta("embedding_model").await.unwrap(),
        "model-a"
    );
}

#[tokio::test]
async fn reindex_without_changes_is_a_noop() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("main.go"), GO_MAIN).unwrap();

    let indexer = make_indexer(tmp.path(), "model-a").await;
    index(&indexer, tmp.path()).await;
    let second = index(&indexer, tmp.path()).await;

    assert_eq!(second.files_total, 1);
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_skipped, 1);
    assert_eq!(second.chunks_total, 0);
}

#[tokio::test]
async fn modifying_one_file_reindexes_only_that_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.go"), "package a\nfunc A() {}\n").unwrap();
    fs::write(tmp.path().join("b.go"), "package b\nfunc B() {}\n").unwrap();

    let indexer = make_indexer(tmp.path(), "model-a").await;
    index(&indexer, tmp.path()).await;
    let b_hash = indexer.store().get_file_hash("b.go").await.unwrap();

    fs::write(tmp.path().join("a.go"), "package a\nfunc A() {}\nfunc A2() {}\n").unwrap();
    let stats = index(&indexer, tmp.path()).await;

    assert_eq!(stats.files_total, 2);
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_skipped, 1);

    // The untouched file's record is byte-identical across runs.
    assert_eq!(indexer.store().get_file_hash("b.go").await.unwrap(), b_hash);

    // And the changed file's chunk set was replaced wholesale.
    let hits = indexer.store().fts_search("A2", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn stored_hash_matches_on_disk_bytes() {
    use sha2::{Digest, Sha256};

    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("main.go"), GO_MAIN).unwrap();

    let indexer = make_indexer(tmp.path(), "model-a").await;
    index(&indexer, tmp.path()).await;

    let mut hasher = Sha256::new();
    hasher.update(fs::read(tmp.path().join("main.go")).unwrap());
    let expected = format!("{:x}", hasher.finalize());
    assert_eq!(
        indexer.store().get_file_hash("main.go").await.unwrap(),
        expected
    );
}

#[tokio::test]
async fn model_change_purges_and_reembeds_everything() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("main.go"), GO_MAIN).unwrap();

    let indexer_a = make_indexer(tmp.path(), "model-a").await;
    index(&indexer_a, tmp.path()).await;
    indexer_a.close().await;

    // Same tree, new embedding model: every eligible file is re-indexed.
    let indexer_b = make_indexer(tmp.path(), "model-b").await;
    let stats = index(&indexer_b, tmp.path()).await;

    assert_eq!(stats.files_total, 1);
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_skipped, 0);
    assert_eq!(
        indexer_b.store().get_meta("embedding_model").await.unwrap(),
        "model-b"
    );
}

#[tokio::test]
async fn ignored_directories_never_reach_the_index() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".synapseignore"), "vendor\n").unwrap();
    fs::write(tmp.path().join("main.go"), GO_MAIN).unwrap();
    fs::create_dir(tmp.path().join("vendor")).unwrap();
    fs::write(tmp.path().join("vendor").join("lib.go"), "package lib\nfunc L() {}\n").unwrap();

    let indexer = make_indexer(tmp.path(), "model-a").await;
    let stats = index(&indexer, tmp.path()).await;

    assert_eq!(stats.files_total, 1);
    let files = indexer.store().list_files().await.unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["main.go"]);
}

#[tokio::test]
async fn oversized_function_is_stored_as_split_windows() {
    let tmp = TempDir::new().unwrap();
    let mut src = String::from("def big():\n");
    for i in 0..400 {
        src.push_str(&format!("    value_{i} = 'xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx'\n"));
    }
    fs::write(tmp.path().join("big.py"), &src).unwrap();

    let indexer = make_indexer(tmp.path(), "model-a").await;
    let stats = index(&indexer, tmp.path()).await;
    assert!(stats.chunks_total >= 2);

    let hits = indexer.store().fts_search("big", 50).await.unwrap();
    assert!(hits.len() >= 2);
    for hit in &hits {
        assert_eq!(hit.chunk.name, "big");
        assert!(hit.chunk.end_line - hit.chunk.start_line + 1 <= 40);
    }
}

#[tokio::test]
async fn hybrid_retrieval_over_an_indexed_tree() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("auth.go"),
        "package auth\nfunc AuthMiddleware() {}\nfunc SessionStore() {}\n",
    )
    .unwrap();
    fs::write(tmp.path().join("render.go"), "package render\nfunc Render() {}\n").unwrap();

    let indexer = make_indexer(tmp.path(), "model-a").await;
    index(&indexer, tmp.path()).await;

    let results = hybrid_retrieve("AuthMiddleware", indexer.store(), &FakeEmbedder, 3)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 3);
    assert_eq!(results[0].chunk.name, "AuthMiddleware");

    let mut ids: Vec<i64> = results.iter().map(|r| r.chunk.id).collect();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before, "duplicate chunk id in hybrid results");

    // The retrieved context renders with file/line banners for the model.
    let messages = build_messages(&results, &[], "how does auth work?", "");
    assert!(messages[1]
        .content
        .contains("--- Chunk 1: auth.go [function_declaration AuthMiddleware]"));
}
