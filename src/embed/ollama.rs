use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::embed::{DimensionGuard, EmbeddingProvider, embed_each, http};
use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// nomic-embed-text, the usual Ollama embedding model
const DEFAULT_DIMENSIONS: usize = 768;

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

/// Ollama `/api/embeddings`. No batch endpoint, so batches fan out with
/// bounded concurrency.
pub struct OllamaProvider {
    agent: ureq::Agent,
    url: String,
    model: String,
    concurrency: usize,
    dims: DimensionGuard,
}

impl OllamaProvider {
    pub fn new(
        model: &str,
        base_url: Option<&str>,
        dimensions: Option<usize>,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: format!("{base}/api/embeddings"),
            model: model.to_string(),
            concurrency,
            dims: DimensionGuard::new(dimensions, DEFAULT_DIMENSIONS),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "model": self.model, "prompt": text });
        let resp: EmbedResponse =
            http::post_json(&self.agent, self.url.clone(), None, body, "Ollama").await?;
        let embedding = resp.embedding.ok_or_else(|| {
            AppError::Embed("Invalid response from Ollama API: missing or invalid embedding".into())
        })?;
        self.dims.observe(&embedding)?;
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        embed_each(self, texts, self.concurrency).await
    }

    fn dimensions(&self) -> usize {
        self.dims.current()
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
