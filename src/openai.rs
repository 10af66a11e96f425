//! Embedding provider backed by an OpenAI-compatible embeddings API.
//!
//! Works against OpenAI itself as well as local servers (LM Studio, vLLM,
//! Ollama) that expose the same `/embeddings` contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedding::{EmbeddingProvider, EncodingConvention, normalize};
use crate::error::{RagError, Result};

/// An [`EmbeddingProvider`] that calls an OpenAI-compatible `/embeddings`
/// endpoint over HTTP.
///
/// Returned vectors are re-normalized to unit L2 length regardless of what
/// the backend produces. The provider is created via [`connect`], which
/// probes the backend once and fails fast on an unreachable or misbehaving
/// endpoint — a fatal startup error, not a per-request one.
///
/// [`connect`]: OpenAiEmbeddingProvider::connect
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    convention: EncodingConvention,
}

impl OpenAiEmbeddingProvider {
    /// Connect to the embeddings endpoint and verify it with a probe embed.
    ///
    /// The probe pins the provider's dimensionality for the process
    /// lifetime; the vector store is opened with the same value, so a
    /// backend that later changes vector length surfaces as a store error,
    /// never as silently mixed dimensionalities.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Connectivity`] if the endpoint is unreachable or
    /// the probe returns no vector.
    pub async fn connect(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        convention: EncodingConvention,
    ) -> Result<Self> {
        let mut provider = Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions: 0,
            convention,
        };

        info!(model = %provider.model, url = %provider.base_url, "probing embedding backend");
        let probe = provider.request(&["dimension probe"]).await.map_err(|e| {
            RagError::Connectivity {
                backend: "embeddings".into(),
                message: format!("startup probe failed: {e}"),
            }
        })?;
        let vector = probe.into_iter().next().ok_or_else(|| RagError::Connectivity {
            backend: "embeddings".into(),
            message: "startup probe returned no vector".into(),
        })?;

        provider.dimensions = vector.len();
        info!(model = %provider.model, dimensions = provider.dimensions, "embedding backend ready");
        Ok(provider)
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest { model: &self.model, input: texts };

        let mut request =
            self.client.post(format!("{}/embeddings", self.base_url)).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = "openai", error = %e, "embedding request failed");
            RagError::Embedding {
                provider: "openai".into(),
                message: format!("request failed: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = "openai", %status, "embedding API error");
            return Err(RagError::Embedding {
                provider: "openai".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "openai", error = %e, "failed to parse embedding response");
            RagError::Embedding {
                provider: "openai".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        let mut vectors: Vec<Vec<f32>> =
            parsed.data.into_iter().map(|d| d.embedding).collect();
        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.model, "embedding batch");
        let vectors = self.request(texts).await?;

        if vectors.len() != texts.len() {
            return Err(RagError::Embedding {
                provider: "openai".into(),
                message: format!(
                    "backend returned {} vectors for {} inputs",
                    vectors.len(),
                    texts.len()
                ),
            });
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn convention(&self) -> EncodingConvention {
        self.convention
    }
}
