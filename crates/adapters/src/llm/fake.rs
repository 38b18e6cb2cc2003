//! Scripted LLM fakes for tests

use super::{BackendError, BackendKind, ChatOutcome, ChatRequest, LlmBackend, ReasoningSession};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// A scripted backend. Replies are popped in order; an empty script
/// yields an empty reply rather than an error.
#[derive(Clone)]
pub struct FakeBackend {
    name: String,
    kind: BackendKind,
    replies: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    healthy: Arc<AtomicBool>,
    fail_next: Arc<AtomicBool>,
}

impl FakeBackend {
    pub fn new(name: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            kind,
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            healthy: Arc::new(AtomicBool::new(true)),
            fail_next: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.replies.lock().push_back(text.into());
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make the next `chat` call fail with a transient error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Prompts received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LlmBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "fake"
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn probe(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn chat(&self, req: ChatRequest) -> Result<ChatOutcome, BackendError> {
        self.calls.lock().push(req.prompt.clone());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Unavailable("scripted failure".into()));
        }
        let text = self.replies.lock().pop_front().unwrap_or_default();
        Ok(ChatOutcome {
            output_tokens: text.len() as u64 / 4,
            input_tokens: req.prompt.len() as u64 / 4,
            text,
            cost_usd: 0.0,
            model: "fake".into(),
        })
    }
}

/// A scripted persistent session with controllable accumulators.
#[derive(Clone)]
pub struct FakeSession {
    replies: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    tokens: Arc<AtomicU64>,
    cycles: Arc<AtomicU32>,
    resets: Arc<AtomicU32>,
    id: Arc<Mutex<String>>,
    fail_next: Arc<AtomicBool>,
    cost_per_call: f64,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            tokens: Arc::new(AtomicU64::new(0)),
            cycles: Arc::new(AtomicU32::new(0)),
            resets: Arc::new(AtomicU32::new(0)),
            id: Arc::new(Mutex::new("session-1".into())),
            fail_next: Arc::new(AtomicBool::new(false)),
            cost_per_call: 0.01,
        }
    }

    /// Make the next `chat` call fail with a transient error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_per_call = cost;
        self
    }

    pub fn push_reply(&self, text: impl Into<String>) {
        self.replies.lock().push_back(text.into());
    }

    pub fn set_tokens(&self, tokens: u64) {
        self.tokens.store(tokens, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn reset_count(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningSession for FakeSession {
    async fn chat(&self, req: ChatRequest) -> Result<ChatOutcome, BackendError> {
        self.calls.lock().push(req.prompt.clone());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Unavailable("scripted session failure".into()));
        }
        let text = self.replies.lock().pop_front().unwrap_or_default();
        let outcome = ChatOutcome {
            input_tokens: req.prompt.len() as u64 / 4,
            output_tokens: text.len() as u64 / 4,
            text,
            cost_usd: self.cost_per_call,
            model: "fake-sonnet".into(),
        };
        self.tokens.fetch_add(outcome.total_tokens(), Ordering::SeqCst);
        Ok(outcome)
    }

    fn accumulated_tokens(&self) -> u64 {
        self.tokens.load(Ordering::SeqCst)
    }

    fn cycles_since_reset(&self) -> u32 {
        self.cycles.load(Ordering::SeqCst)
    }

    fn note_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.tokens.store(0, Ordering::SeqCst);
        self.cycles.store(0, Ordering::SeqCst);
        let mut id = self.id.lock();
        *id = format!("session-{}", self.resets.load(Ordering::SeqCst) + 1);
    }

    fn session_id(&self) -> String {
        self.id.lock().clone()
    }

    fn model(&self) -> String {
        "fake-sonnet".into()
    }
}
