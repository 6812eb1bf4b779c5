//! Chat orchestration: prompt assembly from retrieved context and a small
//! stdin REPL.

use std::io::{BufRead, Write};

use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::Result;
use crate::llm::{ChatClient, Message};
use crate::models::SearchResult;
use crate::retriever::hybrid_retrieve;
use crate::store::Store;
use crate::summarize;

const SYSTEM_PROMPT: &str = "You are a code intelligence assistant. You answer questions about a codebase using the retrieved source code context provided below.\n\nFocus on answering how, why, and where questions about the code. Explain architecture, data flow, and relationships between components. Reference specific file paths and line numbers when relevant.\n\nDo not generate new code unless explicitly asked. Keep answers concise and grounded in the provided context. If the context doesn't contain enough information to answer, say so.";

/// Most user/assistant messages carried into the next turn.
const MAX_HISTORY_MESSAGES: usize = 20;

/// Builds the message list for the LLM from retrieved chunks, conversation
/// history, and the current question.
pub fn build_messages(
    chunks: &[SearchResult],
    history: &[Message],
    question: &str,
    overview: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 4);

    let mut system = SYSTEM_PROMPT.to_string();
    if !overview.is_empty() {
        system.push_str("\n\n## Project Overview\n\n");
        system.push_str(overview);
    }
    messages.push(Message::system(system));

    if !chunks.is_empty() {
        let mut context = String::from("Here is the relevant source code context:\n\n");
        for (i, result) in chunks.iter().enumerate() {
            context.push_str(&format!(
                "--- Chunk {}: {} [{} {}] (lines {}–{}, {}) ---\n",
                i + 1,
                result.file_path,
                result.chunk.kind,
                result.chunk.name,
                result.chunk.start_line,
                result.chunk.end_line,
                result.language
            ));
            context.push_str(&result.chunk.content);
            context.push_str("\n\n");
        }
        messages.push(Message::user(context));
        messages.push(Message::assistant(
            "I've reviewed the code context. What would you like to know?",
        ));
    }

    messages.extend_from_slice(history);
    messages.push(Message::user(question));
    messages
}

/// Appends a completed turn and trims history to the last
/// [`MAX_HISTORY_MESSAGES`] messages.
pub fn push_history(history: &mut Vec<Message>, question: &str, answer: &str) {
    history.push(Message::user(question));
    history.push(Message::assistant(answer));
    if history.len() > MAX_HISTORY_MESSAGES {
        let excess = history.len() - MAX_HISTORY_MESSAGES;
        history.drain(..excess);
    }
}

/// Interactive chat loop over stdin/stdout.
pub async fn run_chat(
    config: &Config,
    store: &Store,
    embedder: &dyn Embedder,
    chat: &dyn ChatClient,
) -> Result<()> {
    let overview = summarize::read_overview(&config.db_path).unwrap_or_default();
    let mut history: Vec<Message> = Vec::new();

    println!("synapse chat (type /help for commands, /exit to quit)");
    println!();

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match question {
            "/exit" | "/quit" => {
                println!("Goodbye.");
                return Ok(());
            }
            "/clear" => {
                history.clear();
                println!("Conversation cleared.");
                continue;
            }
            "/help" => {
                println!("Commands:");
                println!("  /clear  - clear conversation history");
                println!("  /exit   - quit chat");
                println!("  /help   - show this help");
                continue;
            }
            _ => {}
        }

        println!("[Searching...]");

        let chunks = match hybrid_retrieve(question, store, embedder, config.k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                eprintln!("retrieval error: {e}");
                continue;
            }
        };

        let messages = build_messages(&chunks, &history, question, &overview);
        let answer = match chat.generate(&messages).await {
            Ok(answer) => answer,
            Err(e) => {
                eprintln!("llm error: {e}");
                continue;
            }
        };

        println!();
        println!("{answer}");
        println!();

        push_history(&mut history, question, &answer);
    }

    Ok(())
}
