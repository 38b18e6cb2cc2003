//! LLM backend adapters

mod openai;
mod session;

pub use openai::OpenAiBackend;
pub use session::{AnthropicSession, ReasoningSession, TokenPricing, SESSION_SYSTEM_PROMPT};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBackend, FakeSession};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from backend invocations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Transient errors are eligible for bounded retry; permanent
    /// input errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Http(_) | BackendError::Timeout(_) | BackendError::Unavailable(_)
        )
    }
}

/// Which tier a backend belongs to. Selection order within the free
/// tier is `Local` first, then `HostedFree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackendKind {
    Local,
    HostedFree,
    Paid,
}

/// One chat invocation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    /// Per-call system prompt; persistent sessions ignore this and use
    /// their fixed one.
    pub system: Option<String>,
    pub max_tokens: u32,
    /// Absolute deadline for the request.
    pub timeout: Duration,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: 4096,
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// Result of a chat invocation. Backends that do not report cost leave
/// it at zero.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub model: String,
}

impl ChatOutcome {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A registered LLM backend.
#[async_trait]
pub trait LlmBackend: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn kind(&self) -> BackendKind;
    /// Cheap health probe; used before selecting a free backend.
    async fn probe(&self) -> bool;
    async fn chat(&self, req: ChatRequest) -> Result<ChatOutcome, BackendError>;
}
