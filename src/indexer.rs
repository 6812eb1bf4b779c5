//! Indexing facade: owns the store, registry, and service clients, and
//! drives the pipeline plus the post-indexing summarizer.

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::embedder::{Embedder, OllamaEmbedder};
use crate::error::Result;
use crate::languages::Registry;
use crate::llm::{ChatClient, OllamaChat};
use crate::pipeline::{run_pipeline, Outcome, ProgressFn};
use crate::store::Store;
use crate::summarize;

/// Key in the meta table recording the model vectors were last built with.
const META_EMBEDDING_MODEL: &str = "embedding_model";

/// Public API for indexing a codebase.
pub struct Indexer {
    store: Store,
    registry: Arc<Registry>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatClient>,
    config: Config,
}

impl Indexer {
    /// Opens the store and wires up the Ollama clients from config.
    pub async fn new(config: Config) -> Result<Indexer> {
        let store = Store::open(&config.db_path).await?;
        let embedder: Arc<dyn Embedder> =
            Arc::new(OllamaEmbedder::new(&config.ollama_url, &config.embed_model));
        let chat: Arc<dyn ChatClient> =
            Arc::new(OllamaChat::new(&config.ollama_url, &config.overview_model));
        Ok(Self::with_clients(config, store, embedder, chat))
    }

    /// Assembles an indexer from pre-built parts. Lets tests substitute
    /// deterministic service clients.
    pub fn with_clients(
        config: Config,
        store: Store,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatClient>,
    ) -> Indexer {
        Indexer {
            store,
            registry: Arc::new(Registry::builtin()),
            embedder,
            chat,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Indexes the codebase at `root`.
    ///
    /// Before walking, compares the configured embedding model against the
    /// one recorded in metadata; a change purges all files, chunks, and
    /// vectors so nothing is served from a foreign vector space. After a
    /// successful run the metadata is updated and, when at least one file
    /// was persisted, summaries and the project overview are generated.
    pub async fn index(&self, root: &Path, progress: Option<ProgressFn>) -> Result<Outcome> {
        let last_model = self.store.get_meta(META_EMBEDDING_MODEL).await?;
        if !last_model.is_empty() && last_model != self.config.embed_model {
            println!(
                "Embedding model changed from {last_model:?} to {:?} — re-indexing all files",
                self.config.embed_model
            );
            self.store.delete_all_chunks().await?;
        }

        let outcome = run_pipeline(
            root,
            &self.store,
            &self.registry,
            &self.embedder,
            self.config.effective_workers(),
            progress,
        )
        .await;

        if outcome.failure.is_some() {
            return Ok(outcome);
        }

        self.store
            .set_meta(META_EMBEDDING_MODEL, &self.config.embed_model)
            .await?;

        if outcome.stats.files_indexed > 0 {
            println!("Generating file summaries...");
            if let Err(e) = summarize::summarize_files(&self.store, self.chat.as_ref()).await {
                eprintln!("warning: file summarization failed: {e}");
            }

            println!("Generating project overview...");
            match summarize::synthesize_overview(&self.store, self.chat.as_ref()).await {
                Ok(overview) => {
                    if let Err(e) = summarize::write_overview(&self.config.db_path, &overview) {
                        eprintln!("warning: failed to write overview: {e}");
                    }
                }
                Err(e) => eprintln!("warning: overview generation failed: {e}"),
            }
        }

        Ok(outcome)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
