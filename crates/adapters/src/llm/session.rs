//! Persistent paid reasoning session.
//!
//! The paid tier runs against a long-lived session that carries the
//! conversation across cycles, so the model can skip work it already
//! completed. The session is respawned (fresh id, empty history, zeroed
//! accumulators) when the router's reset policy says so.

use super::{BackendError, ChatOutcome, ChatRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Fixed system prompt for every persistent session.
pub const SESSION_SYSTEM_PROMPT: &str = "You are the user's autonomous agent running in a \
persistent session. You remember previous cycles. Do NOT repeat work you already did in \
previous messages. Check your conversation history before acting. If you already completed \
a task, skip it and move to the next one.";

/// A long-running reasoning session addressed by an opaque id.
#[async_trait]
pub trait ReasoningSession: Send + Sync + 'static {
    async fn chat(&self, req: ChatRequest) -> Result<ChatOutcome, BackendError>;
    /// Tokens accumulated since the last reset.
    fn accumulated_tokens(&self) -> u64;
    /// Cycles served since the last reset.
    fn cycles_since_reset(&self) -> u32;
    /// Count one supervisor cycle against this session.
    fn note_cycle(&self);
    /// Respawn: new id, history dropped, accumulators zeroed.
    fn reset(&self);
    fn session_id(&self) -> String;
    fn model(&self) -> String;
}

#[derive(Debug, Clone)]
struct Turn {
    role: &'static str,
    content: String,
}

struct SessionInner {
    id: String,
    history: Vec<Turn>,
    total_tokens: u64,
    cycles: u32,
}

impl SessionInner {
    fn fresh() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            history: Vec::new(),
            total_tokens: 0,
            cycles: 0,
        }
    }
}

/// Per-million-token pricing used to derive `cost_usd`.
#[derive(Debug, Clone, Copy)]
pub struct TokenPricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl TokenPricing {
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_mtok + output_tokens as f64 * self.output_per_mtok)
            / 1_000_000.0
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize, Default)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Paid session over the Anthropic-style `/v1/messages` wire.
pub struct AnthropicSession {
    base_url: String,
    model: String,
    api_key: String,
    pricing: TokenPricing,
    client: reqwest::Client,
    inner: Mutex<SessionInner>,
}

impl AnthropicSession {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        pricing: TokenPricing,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            pricing,
            client: reqwest::Client::new(),
            inner: Mutex::new(SessionInner::fresh()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ReasoningSession for AnthropicSession {
    async fn chat(&self, req: ChatRequest) -> Result<ChatOutcome, BackendError> {
        // Snapshot history + user turn without holding the lock across I/O
        let messages: Vec<serde_json::Value> = {
            let inner = self.inner.lock();
            inner
                .history
                .iter()
                .map(|t| json!({"role": t.role, "content": t.content}))
                .chain(std::iter::once(
                    json!({"role": "user", "content": req.prompt}),
                ))
                .collect()
        };

        let response = self
            .client
            .post(self.endpoint())
            .timeout(req.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.model,
                "system": SESSION_SYSTEM_PROMPT,
                "max_tokens": req.max_tokens,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| {
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

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        let outcome = ChatOutcome {
            cost_usd: self
                .pricing
                .cost(parsed.usage.input_tokens, parsed.usage.output_tokens),
            text: text.clone(),
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
            model: self.model.clone(),
        };

        // Only commit to history after a successful exchange
        let mut inner = self.inner.lock();
        inner.history.push(Turn {
            role: "user",
            content: req.prompt,
        });
        inner.history.push(Turn {
            role: "assistant",
            content: text,
        });
        inner.total_tokens += outcome.total_tokens();
        Ok(outcome)
    }

    fn accumulated_tokens(&self) -> u64 {
        self.inner.lock().total_tokens
    }

    fn cycles_since_reset(&self) -> u32 {
        self.inner.lock().cycles
    }

    fn note_cycle(&self) {
        self.inner.lock().cycles += 1;
    }

    fn reset(&self) {
        let mut inner = self.inner.lock();
        let old_id = std::mem::replace(&mut *inner, SessionInner::fresh()).id;
        info!(%old_id, new_id = %inner.id, "persistent session respawned");
    }

    fn session_id(&self) -> String {
        self.inner.lock().id.clone()
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
