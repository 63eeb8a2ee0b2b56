pub mod http;
pub mod ollama;
pub mod openai;
pub mod voyage;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{AppError, Result};


/// Default fan-out for providers that only expose a single-text endpoint.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Turns text into fixed-length vectors.
///
/// Every vector a provider instance returns has the same length. Until the
/// first real embedding is observed, `dimensions()` is a best-effort default.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// Vector length as known at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensionality {
    /// Nothing observed yet; `default` is the advertised guess.
    Unresolved { default: usize },
    Resolved(usize),
}

impl Dimensionality {
    pub fn get(self) -> usize {
        match self {
            Dimensionality::Unresolved { default } => default,
            Dimensionality::Resolved(n) => n,
        }
    }

    /// Fix the length on first observation; afterwards return `Err((expected, actual))`
    /// for any vector of a different length.
    pub fn observe(&mut self, len: usize) -> std::result::Result<(), (usize, usize)> {
        match *self {
            Dimensionality::Unresolved { .. } => {
                *self = Dimensionality::Resolved(len);
                Ok(())
            }
            Dimensionality::Resolved(n) if n == len => Ok(()),
            Dimensionality::Resolved(n) => Err((n, len)),
        }
    }
}

/// Provider-side dimensionality tracker shared across concurrent calls.
#[derive(Debug)]
pub struct DimensionGuard {
    state: Mutex<Dimensionality>,
}

impl DimensionGuard {
    /// `explicit` pins the length up front; otherwise `default` is advertised until observed.
    pub fn new(explicit: Option<usize>, default: usize) -> Self {
        let state = match explicit {
            Some(n) => Dimensionality::Resolved(n),
            None => Dimensionality::Unresolved { default },
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn current(&self) -> usize {
        self.lock().get()
    }

    pub fn observe(&self, vector: &[f32]) -> Result<()> {
        self.lock().observe(vector.len()).map_err(|(expected, actual)| {
            AppError::Embed(format!(
                "embedding dimension mismatch: expected {expected}, got {actual}; \
                 the model may have changed"
            ))
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Dimensionality> {
        // The state is a plain Copy value, so a poisoned lock still holds a valid one.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Embed `texts` one request at a time with at most `concurrency` in flight,
/// preserving input order. Fails the whole batch on the first error.
pub async fn embed_each<P>(provider: &P, texts: &[String], concurrency: usize) -> Result<Vec<Vec<f32>>>
where
    P: EmbeddingProvider + ?Sized,
{
    let futs: Vec<_> = texts.iter().map(|t| provider.embed(t)).collect();
    futures::stream::iter(futs)
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

pub fn create_provider(config: &EmbedConfig) -> Result<Box<dyn EmbeddingProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let provider: Box<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Ollama => Box::new(ollama::OllamaProvider::new(
            &config.model,
            config.base_url.as_deref(),
            config.dimensions,
            timeout,
            config.concurrency,
        )),
        ProviderKind::Openai => {
            let key = api_key(config, "OPENAI_API_KEY")?;
            Box::new(openai::OpenAiProvider::new(
                &config.model,
                key,
                config.base_url.as_deref(),
                config.dimensions,
                timeout,
            ))
        }
        ProviderKind::Voyageai => {
            let key = api_key(config, "VOYAGE_API_KEY")?;
            Box::new(voyage::VoyageProvider::new(
                &config.model,
                key,
                config.base_url.as_deref(),
                config.dimensions,
                timeout,
            ))
        }
    };
    tracing::info!(
        "embedding provider: {} (model {}, {} dims{})",
        provider.name(),
        config.model,
        provider.dimensions(),
        if config.dimensions.is_some() { "" } else { " until first response" }
    );
    Ok(provider)
}

fn api_key(config: &EmbedConfig, env_var: &str) -> Result<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            AppError::Other(anyhow::anyhow!(
                "{} provider needs an API key: set embed.api_key or {env_var}",
                config.provider
            ))
        })
}
