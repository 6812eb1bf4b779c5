//! MCP tool server over stdio.
//!
//! Exposes the index to MCP clients as four read-only, idempotent tools:
//! `search_codebase`, `get_file_summary`, `get_project_overview`, and
//! `list_indexed_files`. Wire framing is handled by the `rmcp` crate; this
//! module only supplies tool descriptors and handlers.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::transport::stdio;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};

use crate::config::Config;
use crate::embedder::{Embedder, OllamaEmbedder};
use crate::error::{Error, Result};
use crate::retriever::hybrid_retrieve;
use crate::store::Store;
use crate::summarize;

/// Longest summary excerpt returned by `list_indexed_files`.
const SUMMARY_SNIPPET_LEN: usize = 200;

/// MCP handler. Each session receives a clone; the store pool and embedder
/// are shared behind `Arc`.
#[derive(Clone)]
pub struct SynapseServer {
    config: Arc<Config>,
    store: Store,
    embedder: Arc<dyn Embedder>,
}

impl SynapseServer {
    pub fn new(config: Config, store: Store) -> Self {
        let embedder: Arc<dyn Embedder> =
            Arc::new(OllamaEmbedder::new(&config.ollama_url, &config.embed_model));
        SynapseServer {
            config: Arc::new(config),
            store,
            embedder,
        }
    }

    fn tool(name: &str, description: &str, schema: serde_json::Value) -> Tool {
        let input_schema = match schema {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };
        Tool {
            name: Cow::Owned(name.to_string()),
            title: None,
            description: Some(Cow::Owned(description.to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(
                ToolAnnotations::new()
                    .read_only(true)
                    .idempotent(true),
            ),
            icons: None,
            meta: None,
        }
    }

    fn tools() -> Vec<Tool> {
        vec![
            Self::tool(
                "search_codebase",
                "Semantically search the indexed codebase using hybrid BM25 + vector similarity. \
                 Returns relevant code chunks with file paths and line numbers.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Natural language or keyword query to search the codebase"
                        },
                        "k": {
                            "type": "number",
                            "description": "Maximum number of chunks to return (default 10)"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            Self::tool(
                "get_file_summary",
                "Get the LLM-generated summary and metadata for a specific indexed file.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File path as indexed (relative to the project root)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            Self::tool(
                "get_project_overview",
                "Get the high-level project overview synthesized from all file summaries during indexing.",
                serde_json::json!({ "type": "object", "properties": {} }),
            ),
            Self::tool(
                "list_indexed_files",
                "List all indexed files with language, chunk count, and summary snippet.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "language": {
                            "type": "string",
                            "description": "Only list files in this language (e.g. \"go\", \"python\")"
                        }
                    }
                }),
            ),
        ]
    }

    async fn handle_search(&self, args: &serde_json::Value) -> Result<String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if query.is_empty() {
            return Err(Error::Retrieve("query must not be empty".into()));
        }
        let k = args
            .get("k")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(self.config.k);

        let results = hybrid_retrieve(query, &self.store, self.embedder.as_ref(), k).await?;
        if results.is_empty() {
            return Ok("No matching code found.".to_string());
        }

        let mut out = format!("Found {} chunks:\n\n", results.len());
        for (i, result) in results.iter().enumerate() {
            out.push_str(&format!(
                "--- Result {}: {} [{} {}] (lines {}–{}, {}) ---\n{}\n\n",
                i + 1,
                result.file_path,
                result.chunk.kind,
                result.chunk.name,
                result.chunk.start_line,
                result.chunk.end_line,
                result.language,
                result.chunk.content
            ));
        }
        Ok(out)
    }

    async fn handle_file_summary(&self, args: &serde_json::Value) -> Result<String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let Some(file) = self.store.get_file(path).await? else {
            return Ok(format!("File not found in index: {path}"));
        };

        let summary = if file.summary.is_empty() {
            "(no summary generated)"
        } else {
            file.summary.as_str()
        };
        Ok(format!(
            "File: {}\nLanguage: {}\nChunks: {}\nIndexed at: {}\n\n{}",
            file.path,
            file.language,
            file.chunks,
            file.indexed_at.format("%Y-%m-%d %H:%M:%S"),
            summary
        ))
    }

    fn handle_overview(&self) -> String {
        match summarize::read_overview(&self.config.db_path) {
            Some(overview) if !overview.trim().is_empty() => overview,
            _ => "No project overview available. Run 'synapse index <path>' to generate one."
                .to_string(),
        }
    }

    async fn handle_list_files(&self, args: &serde_json::Value) -> Result<String> {
        let language = args.get("language").and_then(|v| v.as_str());
        let files = self.store.list_files().await?;

        let mut out = String::new();
        for file in &files {
            if let Some(lang) = language {
                if file.language != lang {
                    continue;
                }
            }
            let snippet: String = file.summary.chars().take(SUMMARY_SNIPPET_LEN).collect();
            out.push_str(&format!(
                "{} ({}, {} chunks)",
                file.path, file.language, file.chunks
            ));
            if !snippet.is_empty() {
                out.push_str(&format!(" — {snippet}"));
            }
            out.push('\n');
        }

        if out.is_empty() {
            return Ok("No indexed files.".to_string());
        }
        Ok(out)
    }
}

impl ServerHandler for SynapseServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "synapse".to_string(),
                title: Some("Synapse".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Synapse — local code intelligence over an indexed repository. \
                 Use search_codebase to find relevant code, get_file_summary for a \
                 single file, get_project_overview for the architecture, and \
                 list_indexed_files to see what is indexed."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, McpError>> + Send + '_
    {
        std::future::ready(Ok(ListToolsResult::with_all_items(Self::tools())))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let args = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        let result = match request.name.as_ref() {
            "search_codebase" => self.handle_search(&args).await,
            "get_file_summary" => self.handle_file_summary(&args).await,
            "get_project_overview" => Ok(self.handle_overview()),
            "list_indexed_files" => self.handle_list_files(&args).await,
            other => {
                return Err(McpError::new(
                    ErrorCode::METHOD_NOT_FOUND,
                    format!("no tool registered with name: {other}"),
                    None,
                ))
            }
        };

        match result {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

/// Serves the MCP tools over stdio until the client disconnects.
pub async fn run_mcp(config: Config) -> Result<()> {
    let store = Store::open(&config.db_path).await?;
    let server = SynapseServer::new(config, store);

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| Error::Config(format!("mcp serve: {e}")))?;
    service
        .waiting()
        .await
        .map_err(|e| Error::Config(format!("mcp server: {e}")))?;
    Ok(())
}
