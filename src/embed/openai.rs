use std::time::Duration;

use async_trait::async_trait;

use crate::embed::{DimensionGuard, EmbeddingProvider, http};
use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// text-embedding-3-large is 3072 wide; 3-small and ada-002 are 1536.
pub fn default_dimensions(model: &str) -> usize {
    if model.contains("large") { 3072 } else { 1536 }
}

pub struct OpenAiProvider {
    agent: ureq::Agent,
    url: String,
    model: String,
    api_key: String,
    dims: DimensionGuard,
}

impl OpenAiProvider {
    pub fn new(
        model: &str,
        api_key: String,
        base_url: Option<&str>,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Self {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: format!("{base}/embeddings"),
            model: model.to_string(),
            api_key,
            dims: DimensionGuard::new(dimensions, default_dimensions(model)),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::Embed("Invalid response from OpenAI API: empty data".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let resp: http::DataResponse = http::post_json(
            &self.agent,
            self.url.clone(),
            Some(&self.api_key),
            body,
            "OpenAI",
        )
        .await?;
        let vectors = resp.into_vectors(texts.len(), "OpenAI")?;
        for v in &vectors {
            self.dims.observe(v)?;
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dims.current()
    }

    fn name(&self) -> &str {
        "openai"
    }
}
