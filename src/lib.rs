//! # Synapse
//!
//! **Local code intelligence: index a repository once, ask questions about it.**
//!
//! Synapse walks a source tree, extracts semantically named chunks with
//! tree-sitter, indexes them both lexically (FTS5/BM25) and as embedding
//! vectors in a single SQLite file, and answers natural-language questions
//! by feeding hybrid-retrieved context to a locally hosted model (Ollama).
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌──────────────────────────────┐   ┌───────────┐
//! │ Walker │──▶│  Pipeline                     │──▶│  SQLite    │
//! │        │   │ hash → chunk → embed → store │   │ FTS5+Vec  │
//! └────────┘   └──────────────────────────────┘   └─────┬─────┘
//!                                                       │
//!                                  ┌────────────────────┤
//!                                  ▼                    ▼
//!                             ┌─────────┐         ┌─────────┐
//!                             │  chat   │         │   MCP   │
//!                             │ (REPL)  │         │ (stdio) │
//!                             └─────────┘         └─────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **walker** ([`walker`]) streams eligible files, honoring
//!    `.synapseignore` patterns and size caps.
//! 2. The **pipeline** ([`pipeline`]) hashes each file and skips those whose
//!    bytes are unchanged since the last run.
//! 3. Changed files go through the **AST chunker** ([`chunker`]), which
//!    extracts named definitions via per-language capture queries
//!    ([`languages`]) and enriches each with a file/language/symbol header.
//! 4. Chunks are embedded in batches ([`embedder`]) and persisted
//!    atomically per file ([`store`]).
//! 5. Questions are answered by **hybrid retrieval** ([`retriever`]):
//!    BM25 keyword hits first, vector hits filling in, handed to the
//!    chat model ([`chat`], [`llm`]).
//! 6. After indexing, the **summarizer** ([`summarize`]) writes per-file
//!    summaries and a project `overview.md`.
//!
//! ## Quick Start
//!
//! ```bash
//! synapse index .               # build <root>/.synapse/index.db
//! synapse chat                  # ask questions about the codebase
//! synapse mcp                   # serve search tools over MCP stdio
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Runtime configuration from CLI flags |
//! | [`error`] | Closed error set shared across components |
//! | [`walker`] | Directory walk with `.synapseignore` handling |
//! | [`languages`] | Extension → grammar + capture query registry |
//! | [`chunker`] | AST-driven chunk extraction and enrichment |
//! | [`store`] | SQLite persistence: files, chunks, vectors, FTS, meta |
//! | [`embedder`] | Ollama embedding client |
//! | [`llm`] | Ollama chat client |
//! | [`pipeline`] | Staged concurrent indexing with incrementality |
//! | [`indexer`] | Facade tying store, pipeline, and summarizer together |
//! | [`retriever`] | Hybrid (keyword + vector) retrieval |
//! | [`summarize`] | File summaries and the project overview |
//! | [`chat`] | Prompt assembly and the interactive REPL |
//! | [`mcp`] | MCP tool server over stdio |
//! | [`progress`] | Stderr progress reporting |

pub mod chat;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod retriever;
pub mod store;
pub mod summarize;
pub mod walker;
