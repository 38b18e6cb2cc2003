// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! External collaborators behind narrow traits: LLM backends, the
//! persistent reasoning session, messaging, notification, the tool
//! bridge, error analytics and the auto-coder.
//!
//! The engine depends on these traits only; concrete adapters are
//! wired at startup by the daemon.

pub mod analytics;
pub mod autocoder;
pub mod env;
pub mod llm;
pub mod messaging;
pub mod notify;
pub mod subprocess;
pub mod tools;

pub use analytics::{ErrorAnalytics, ErrorSpike, MemoryErrorAnalytics};
pub use autocoder::{
    sanitize_commit_field, AutoCoder, AutoCoderError, CommitReport, GitAutoCoder, TestRun,
};
pub use llm::{
    AnthropicSession, BackendError, BackendKind, ChatOutcome, ChatRequest, LlmBackend,
    OpenAiBackend, ReasoningSession, TokenPricing, SESSION_SYSTEM_PROMPT,
};
pub use messaging::{HttpMessaging, MessageCategory, Messaging, NoOpMessaging};
pub use notify::{NoOpNotify, Notify, NotifyError, TelegramNotify};
pub use tools::{NoOpToolBridge, ToolBridge, ToolResult};

#[cfg(any(test, feature = "test-support"))]
pub use autocoder::FakeAutoCoder;
#[cfg(any(test, feature = "test-support"))]
pub use llm::{FakeBackend, FakeSession};
#[cfg(any(test, feature = "test-support"))]
pub use messaging::FakeMessaging;
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotify;
#[cfg(any(test, feature = "test-support"))]
pub use tools::FakeToolBridge;
