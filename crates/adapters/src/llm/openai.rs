//! OpenAI-compatible chat client for free and local backends.
//!
//! Speaks plain `/v1/chat/completions` JSON. Used for anything
//! discovered through the `LLM_<NAME>_*` environment convention.

use super::{BackendError, BackendKind, ChatOutcome, ChatRequest, LlmBackend};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Probe timeout; a healthy local server answers well inside this.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// One retry on transient failure, with a small jitter so stacked
/// backends do not hammer a recovering server in lockstep.
const RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// OpenAI-compatible backend client.
pub struct OpenAiBackend {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    kind: BackendKind,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        kind: BackendKind,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            kind,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn chat_once(&self, req: &ChatRequest) -> Result<ChatOutcome, BackendError> {
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": req.prompt}));

        let mut request = self
            .client
            .post(self.endpoint("/v1/chat/completions"))
            .timeout(req.timeout)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "max_tokens": req.max_tokens,
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(req.timeout)
            } else if e.is_connect() {
                BackendError::Unavailable(e.to_string())
            } else {
                BackendError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized(status.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http(format!("{status}: {body}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("empty choices".into()))?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(ChatOutcome {
            text,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            // Free and local backends do not report cost
            cost_usd: 0.0,
            model: self.model.clone(),
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn probe(&self) -> bool {
        let mut request = self
            .client
            .get(self.endpoint("/v1/models"))
            .timeout(PROBE_TIMEOUT);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(backend = %self.name, error = %e, "probe failed");
                false
            }
        }
    }

    async fn chat(&self, req: ChatRequest) -> Result<ChatOutcome, BackendError> {
        match self.chat_once(&req).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_transient() => {
                let jitter = rand::rng().random_range(0..RETRY_BASE_DELAY_MS);
                warn!(backend = %self.name, error = %e, "transient backend error, retrying once");
                tokio::time::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS + jitter)).await;
                self.chat_once(&req).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
