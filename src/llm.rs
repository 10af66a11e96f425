//! Chat model client for answer generation.
//!
//! [`OpenAiChatModel`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint (LM Studio, vLLM, Ollama, OpenAI). The startup connectivity
//! check runs a bounded retry loop and aborts the process rather than
//! serving with a broken generation path.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::document::Role;
use crate::error::{RagError, Result};

/// One message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// The author of the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// A system instruction message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A model that turns an ordered message list into a text reply.
///
/// Generation is temperature-controlled and inherently non-deterministic.
/// Request-time failures are returned as errors; the orchestrator converts
/// them into a user-facing fallback, never a raw transport error.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a completion for the given messages.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Bounded retry policy for the startup connectivity check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total connection attempts before giving up.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 5, backoff: Duration::from_secs(3) }
    }
}

/// A [`ChatModel`] backed by an OpenAI-compatible chat completions API.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 512;

impl OpenAiChatModel {
    /// Connect to the chat backend, verifying it before the process serves
    /// traffic.
    ///
    /// Each attempt lists the backend's models; when the configured model is
    /// not among them the first available model is substituted (local
    /// servers typically expose exactly one). Attempts are spaced by the
    /// policy's fixed backoff.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Connectivity`] after the final failed attempt.
    /// This aborts startup; a broken generation path must not serve.
    pub async fn connect(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let mut client = Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        };

        let mut last_error = String::new();
        for attempt in 1..=retry.attempts.max(1) {
            match client.list_models().await {
                Ok(models) => {
                    info!(available = ?models, "chat backend reachable");
                    if !models.is_empty() && !models.iter().any(|m| m == &client.model) {
                        warn!(
                            configured = %client.model,
                            using = %models[0],
                            "configured model not served, substituting"
                        );
                        client.model = models[0].clone();
                    }
                    return Ok(client);
                }
                Err(e) => {
                    warn!(attempt, max = retry.attempts, error = %e, "chat backend not reachable");
                    last_error = e.to_string();
                    if attempt < retry.attempts {
                        tokio::time::sleep(retry.backoff).await;
                    }
                }
            }
        }

        error!(url = %client.base_url, "chat backend unreachable, refusing to start");
        Err(RagError::Connectivity {
            backend: "llm".into(),
            message: format!(
                "no connection after {} attempts: {last_error}",
                retry.attempts
            ),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let mut request = self.client.get(format!("{}/models", self.base_url));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await.map_err(|e| RagError::Connectivity {
            backend: "llm".into(),
            message: format!("model listing failed: {e}"),
        })?;
        if !response.status().is_success() {
            return Err(RagError::Connectivity {
                backend: "llm".into(),
                message: format!("model listing returned {}", response.status()),
            });
        }
        let parsed: ModelList = response.json().await.map_err(|e| RagError::Connectivity {
            backend: "llm".into(),
            message: format!("failed to parse model listing: {e}"),
        })?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }

    /// The model name actually in use (after any startup substitution).
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(model = %self.model, message_count = messages.len(), "requesting completion");

        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        let mut request =
            self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "completion request failed");
            RagError::Connectivity {
                backend: "llm".into(),
                message: format!("completion request failed: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, "completion request rejected");
            return Err(RagError::Connectivity {
                backend: "llm".into(),
                message: format!("completion returned {status}"),
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            RagError::Connectivity {
                backend: "llm".into(),
                message: format!("failed to parse completion: {e}"),
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| RagError::Connectivity {
                backend: "llm".into(),
                message: "completion carried no choices".into(),
            })?;

        Ok(text)
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn connect_gives_up_after_bounded_attempts() {
        let retry = RetryPolicy { attempts: 2, backoff: Duration::from_secs(3) };
        // Nothing listens on this port; with paused time the backoff sleeps
        // auto-advance, so the test stays fast.
        let result =
            OpenAiChatModel::connect("http://127.0.0.1:9", "", "local-model", retry).await;
        assert!(matches!(result, Err(RagError::Connectivity { .. })));
    }

    #[test]
    fn default_retry_policy_matches_deployment() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.attempts, 5);
        assert_eq!(retry.backoff, Duration::from_secs(3));
    }
}
