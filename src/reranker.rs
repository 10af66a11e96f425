//! Second-pass relevance scoring of retrieved candidates.
//!
//! Reranking compares the query and each document jointly with a pairwise
//! relevance model, which is more accurate (and more expensive) than the
//! first-pass vector similarity. Availability is best-effort: when the
//! model is unreachable the reranker degrades to pass-through ordering
//! instead of failing, so downstream logic always sees a uniform-shaped
//! result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::RerankedResult;

/// Neutral relevance assigned when no model scored the documents.
pub const NEUTRAL_RELEVANCE: f32 = 1.0;

/// A reranker that re-scores documents against a query.
///
/// `rerank` is infallible by contract: implementations degrade to the
/// pass-through ordering on any internal failure.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score every `(query, document)` pair, sort descending by relevance,
    /// and truncate to `top_k`.
    ///
    /// With an unavailable model or an empty document list this returns the
    /// first `top_k` documents in their original order, each tagged with
    /// [`NEUTRAL_RELEVANCE`].
    async fn rerank(&self, query: &str, documents: &[String], top_k: usize)
    -> Vec<RerankedResult>;
}

/// The degraded result: first `top_k` documents, original order, neutral
/// relevance.
fn passthrough(documents: &[String], top_k: usize) -> Vec<RerankedResult> {
    documents
        .iter()
        .take(top_k)
        .map(|text| RerankedResult { text: text.clone(), relevance: NEUTRAL_RELEVANCE })
        .collect()
}

/// A reranker that always passes documents through unchanged.
///
/// Used for deployments without a reranking model and as a test double.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Vec<RerankedResult> {
        passthrough(documents, top_k)
    }
}

/// A [`Reranker`] backed by a Jina/Cohere-style `/rerank` HTTP endpoint.
///
/// [`connect`](HttpReranker::connect) probes the backend once at startup.
/// A failed probe does not abort the process: the reranker comes up in
/// degraded (pass-through) mode, matching the policy that reranking is an
/// accuracy improvement, never a hard dependency.
pub struct HttpReranker {
    client: Option<reqwest::Client>,
    base_url: String,
    model: String,
}

impl HttpReranker {
    /// Probe the rerank endpoint and build the reranker.
    ///
    /// Never fails; an unreachable backend produces a degraded instance.
    pub async fn connect(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        let client = reqwest::Client::new();

        let probe = RerankRequest {
            model: &model,
            query: "probe",
            documents: &["probe".to_string()],
            top_n: 1,
        };
        match client.post(format!("{base_url}/rerank")).json(&probe).send().await {
            Ok(response) if response.status().is_success() => {
                info!(model = %model, url = %base_url, "reranker backend ready");
                Self { client: Some(client), base_url, model }
            }
            Ok(response) => {
                warn!(status = %response.status(), "reranker probe rejected, running without reranking");
                Self { client: None, base_url, model }
            }
            Err(e) => {
                warn!(error = %e, "reranker unreachable, running without reranking");
                Self { client: None, base_url, model }
            }
        }
    }

    /// Whether a relevance model is actually behind this reranker.
    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    async fn score(
        &self,
        client: &reqwest::Client,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Option<Vec<RerankedResult>> {
        let request = RerankRequest { model: &self.model, query, documents, top_n: top_k };
        let response = client
            .post(format!("{}/rerank", self.base_url))
            .json(&request)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "rerank call rejected, passing candidates through");
            return None;
        }
        let parsed: RerankResponse = response.json().await.ok()?;

        let mut scored: Vec<RerankedResult> = parsed
            .results
            .into_iter()
            .filter_map(|r| {
                documents.get(r.index).map(|text| RerankedResult {
                    text: text.clone(),
                    relevance: r.relevance_score,
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Some(scored)
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Vec<RerankedResult> {
        let Some(client) = &self.client else {
            return passthrough(documents, top_k);
        };
        if documents.is_empty() {
            return Vec::new();
        }

        match self.score(client, query, documents, top_k).await {
            Some(scored) => {
                debug!(candidates = documents.len(), kept = scored.len(), "reranked candidates");
                scored
            }
            None => passthrough(documents, top_k),
        }
    }
}

// ── Rerank API request/response types ──────────────────────────────

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankEntry>,
}

#[derive(Deserialize)]
struct RerankEntry {
    index: usize,
    relevance_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn passthrough_keeps_order_and_neutral_relevance() {
        let reranker = PassthroughReranker;
        let documents = docs(&["first", "second", "third"]);
        let results = reranker.rerank("query", &documents, 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "first");
        assert_eq!(results[1].text, "second");
        assert!(results.iter().all(|r| r.relevance == NEUTRAL_RELEVANCE));
    }

    #[tokio::test]
    async fn passthrough_on_empty_input_is_empty() {
        let reranker = PassthroughReranker;
        let results = reranker.rerank("query", &[], 5).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn degraded_http_reranker_passes_through() {
        // Nothing listens on this port; connect comes up degraded.
        let reranker = HttpReranker::connect("http://127.0.0.1:9", "cross-encoder").await;
        assert!(!reranker.is_available());

        let documents = docs(&["a", "b", "c"]);
        let results = reranker.rerank("query", &documents, 3).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "a");
        assert!(results.iter().all(|r| r.relevance == NEUTRAL_RELEVANCE));
    }
}
