//! # Synapse CLI
//!
//! ```bash
//! synapse index <path>   # build or refresh the index
//! synapse chat           # ask questions about the indexed codebase
//! synapse mcp            # serve search tools over MCP stdio
//! ```
//!
//! Shared flags: `--db`, `--ollama`, `--model`, `--chat-model`.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use synapse::chat::run_chat;
use synapse::config::{
    Config, DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL, DEFAULT_K, DEFAULT_OLLAMA_URL,
};
use synapse::embedder::OllamaEmbedder;
use synapse::indexer::Indexer;
use synapse::llm::OllamaChat;
use synapse::mcp::run_mcp;
use synapse::progress;
use synapse::store::Store;

/// Local code intelligence powered by retrieval-augmented generation.
#[derive(Parser)]
#[command(
    name = "synapse",
    about = "Local code intelligence powered by RAG",
    version
)]
struct Cli {
    /// Database path (default: <project>/.synapse/index.db).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Ollama base URL.
    #[arg(long, global = true, default_value = DEFAULT_OLLAMA_URL)]
    ollama: String,

    /// Embedding model.
    #[arg(long, global = true, default_value = DEFAULT_EMBED_MODEL)]
    model: String,

    /// Generative model for chat.
    #[arg(long, global = true, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a codebase for search.
    Index {
        /// Root directory to index.
        path: PathBuf,

        /// Parallel workers (default: CPU count).
        #[arg(long, default_value_t = 0)]
        workers: usize,

        /// Model for overview generation (default: same as --chat-model).
        #[arg(long)]
        overview_model: Option<String>,
    },

    /// Ask questions about your indexed codebase.
    Chat {
        /// Number of chunks retrieved per question.
        #[arg(long, default_value_t = DEFAULT_K)]
        k: usize,
    },

    /// Start an MCP server exposing codebase search tools.
    Mcp {
        /// Number of chunks retrieved per search call.
        #[arg(long, default_value_t = DEFAULT_K)]
        k: usize,
    },
}

impl Cli {
    fn config(&self, db_default_root: Option<&PathBuf>, workers: usize, k: usize) -> Config {
        let db_path = self.db.clone().unwrap_or_else(|| {
            let root = db_default_root
                .cloned()
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
            Config::default_db_path(&root)
        });
        Config {
            db_path,
            ollama_url: self.ollama.clone(),
            embed_model: self.model.clone(),
            chat_model: self.chat_model.clone(),
            overview_model: self.chat_model.clone(),
            workers,
            k,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Index {
            path,
            workers,
            overview_model,
        } => {
            let root = path
                .canonicalize()
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            let mut config = cli.config(Some(&root), *workers, DEFAULT_K);
            if let Some(model) = overview_model {
                config.overview_model = model.clone();
            }
            config.validate()?;

            let indexer = Indexer::new(config).await?;

            println!("Indexing {}...", root.display());
            let start = Instant::now();
            let outcome = indexer.index(&root, Some(progress::stderr_progress())).await?;
            let elapsed = start.elapsed();

            println!();
            println!("Done in {:.1?}", elapsed);
            println!(
                "  Files:   {} total, {} indexed, {} skipped",
                outcome.stats.files_total, outcome.stats.files_indexed, outcome.stats.files_skipped
            );
            println!("  Chunks:  {}", outcome.stats.chunks_total);

            indexer.close().await;
            if let Some(failure) = outcome.failure {
                return Err(failure.into());
            }
        }

        Commands::Chat { k } => {
            let config = cli.config(None, 0, *k);
            config.validate()?;
            config.require_index()?;

            let store = Store::open(&config.db_path).await?;
            let embedder = OllamaEmbedder::new(&config.ollama_url, &config.embed_model);
            let chat = OllamaChat::new(&config.ollama_url, &config.chat_model);

            run_chat(&config, &store, &embedder, &chat).await?;
            store.close().await;
        }

        Commands::Mcp { k } => {
            let config = cli.config(None, 0, *k);
            config.validate()?;
            config.require_index()?;

            run_mcp(config).await?;
        }
    }

    Ok(())
}
