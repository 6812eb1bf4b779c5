//! Chat client for the Ollama `/api/chat` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Per-call timeout for chat generation.
const CHAT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message { role: "assistant".into(), content: content.into() }
    }
}

/// Generates a completion from a conversation.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

/// Client for a local Ollama instance.
pub struct OllamaChat {
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Message,
}

impl OllamaChat {
    pub fn new(base_url: &str, model: &str) -> Self {
        OllamaChat {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl ChatClient for OllamaChat {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .map_err(|e| Error::Chat(format!("build http client: {e}")))?;

        let response = client
            .post(format!("{}/api/chat", self.base_url))
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| Error::Chat(format!("ollama chat request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("ollama chat returned {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Chat(format!("decode chat response: {e}")))?;

        Ok(parsed.message.content)
    }
}
