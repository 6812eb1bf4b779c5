//! LLM-authored file summaries and the project overview.
//!
//! Runs after an indexing pass that persisted at least one file: every file
//! without a summary gets one generated from its indexed content, then all
//! summaries and symbol names are synthesized into a single `overview.md`
//! next to the database.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::llm::{ChatClient, Message};
use crate::store::Store;

const FILE_SUMMARY_PROMPT: &str = "Summarize this source file in 2-3 sentences. What does it define, and what is its role in the project? Be specific about the types, functions, or interfaces it provides. Do not speculate about things not shown in the code.";

const OVERVIEW_PROMPT: &str = r#"You are a senior software architect analyzing a codebase. Based ONLY on the file summaries and symbol names provided below, write a concise architectural overview in Markdown.

Rules:
- ONLY describe what you can directly observe in the provided summaries
- Do NOT guess or infer features that aren't shown
- Do NOT describe external tools or services — describe THIS project
- Use the file summaries and symbol names to understand purpose

Cover:
1. What the project does (one paragraph, based on the summaries you see)
2. Major components/packages and how they connect (bullet points)
3. Key data flows through the system

Keep it under 300 words. Do not include code snippets.
"#;

/// Generates summaries for files that don't have one yet.
pub async fn summarize_files(store: &Store, chat: &dyn ChatClient) -> Result<()> {
    let files = store.list_files().await?;

    for file in &files {
        if !file.summary.is_empty() {
            continue;
        }

        println!("  Summarizing {}...", file.path);

        let content = store.get_all_file_content(&file.path).await?;
        if content.is_empty() {
            continue;
        }

        let prompt = format!(
            "{FILE_SUMMARY_PROMPT}\n\nFile: {}\nLanguage: {}\n\n```\n{}\n```",
            file.path, file.language, content
        );
        let summary = chat
            .generate(&[Message::user(prompt)])
            .await
            .map_err(|e| Error::Chat(format!("summarize {}: {e}", file.path)))?;

        store.set_file_summary(&file.path, summary.trim()).await?;
    }

    Ok(())
}

/// Combines all file summaries and named symbols into a project-level
/// architectural overview.
pub async fn synthesize_overview(store: &Store, chat: &dyn ChatClient) -> Result<String> {
    let files = store.list_files().await?;
    if files.is_empty() {
        return Err(Error::Chat("no files indexed".into()));
    }

    let symbols = store.list_top_chunks().await?;
    let mut symbols_by_file: HashMap<&str, Vec<&crate::models::SymbolListing>> = HashMap::new();
    for symbol in &symbols {
        symbols_by_file
            .entry(symbol.file_path.as_str())
            .or_default()
            .push(symbol);
    }

    let mut prompt = String::from(OVERVIEW_PROMPT);
    prompt.push_str("\n## Project Structure\n\n");
    for file in &files {
        prompt.push_str(&format!(
            "### {}  ({}, {} chunks)\n",
            file.path, file.language, file.chunks
        ));
        if !file.summary.is_empty() {
            prompt.push_str(&format!("Summary: {}\n", file.summary));
        }
        if let Some(file_symbols) = symbols_by_file.get(file.path.as_str()) {
            for symbol in file_symbols {
                prompt.push_str(&format!("  - [{}] {}\n", symbol.kind, symbol.name));
            }
        }
        prompt.push('\n');
    }

    chat.generate(&[Message::user(prompt)]).await
}

/// Loads the project overview written next to the database, if present.
pub fn read_overview(db_path: &Path) -> Option<String> {
    let overview_path = db_path.parent()?.join("overview.md");
    std::fs::read_to_string(overview_path).ok()
}

/// Writes the overview blob next to the database.
pub fn write_overview(db_path: &Path, overview: &str) -> std::io::Result<()> {
    let dir = db_path.parent().unwrap_or(Path::new("."));
    std::fs::write(dir.join("overview.md"), overview)
}
