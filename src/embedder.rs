//! Embedding client for the Ollama `/api/embed` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Per-call timeout for embedding requests.
const EMBED_TIMEOUT: Duration = Duration::from_secs(120);

/// Batch-embeds text. The returned vectors preserve input length and order.
/// Implementations perform no retries; failures surface to the caller.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed(&[text.to_string()]).await?;
        if results.is_empty() {
            return Err(Error::Embed("empty embedding response".into()));
        }
        Ok(results.swap_remove(0))
    }

    /// The configured model name.
    fn model(&self) -> &str;
}

/// Client for a local Ollama instance.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Self {
        OllamaEmbedder {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = reqwest::Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .map_err(|e| Error::Embed(format!("build http client: {e}")))?;

        let response = client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| Error::Embed(format!("ollama embed request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embed(format!("ollama embed returned {status}: {body}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embed(format!("decode embed response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Error::Embed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
