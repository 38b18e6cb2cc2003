//! Outbound messaging adapter.
//!
//! The real channel adapters (WhatsApp/Telegram bridges) live outside
//! this process; the engine only needs `send_to_group`. Each category
//! maps to a configured group address, falling back to the user's
//! direct address.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Routing category for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    Alerts,
    Hattrick,
    #[default]
    Daily,
}

impl MessageCategory {
    pub fn label(&self) -> &'static str {
        match self {
            MessageCategory::Alerts => "alerts",
            MessageCategory::Hattrick => "hattrick",
            MessageCategory::Daily => "daily",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "alerts" => MessageCategory::Alerts,
            "hattrick" => MessageCategory::Hattrick,
            "daily" => MessageCategory::Daily,
            _ => return None,
        })
    }
}

impl std::fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Adapter for sending messages to the user's chat surface.
///
/// Returns `true` when the underlying channel accepted the message.
/// Failure is a routing fact, not an error: the engine logs and moves on.
#[async_trait]
pub trait Messaging: Send + Sync + 'static {
    async fn send_to_group(&self, category: MessageCategory, text: &str) -> bool;
}

/// HTTP bridge to the local channel-adapter process.
pub struct HttpMessaging {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpMessaging {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl Messaging for HttpMessaging {
    async fn send_to_group(&self, category: MessageCategory, text: &str) -> bool {
        let url = format!("{}/send", self.base_url.trim_end_matches('/'));
        let result = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({"category": category.label(), "text": text}))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(category = %category, status = %response.status(), "message send rejected");
                false
            }
            Err(e) => {
                warn!(category = %category, error = %e, "message send failed");
                false
            }
        }
    }
}

/// Drops everything; used when no channel adapter is configured.
#[derive(Clone, Default)]
pub struct NoOpMessaging;

#[async_trait]
impl Messaging for NoOpMessaging {
    async fn send_to_group(&self, category: MessageCategory, text: &str) -> bool {
        debug!(category = %category, len = text.len(), "messaging disabled, dropping");
        false
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMessaging;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records sends; configurable accept/reject.
    #[derive(Clone, Default)]
    pub struct FakeMessaging {
        sent: Arc<Mutex<Vec<(MessageCategory, String)>>>,
        reject: Arc<std::sync::atomic::AtomicBool>,
    }

    impl FakeMessaging {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<(MessageCategory, String)> {
            self.sent.lock().clone()
        }

        pub fn set_reject(&self, reject: bool) {
            self.reject
                .store(reject, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Messaging for FakeMessaging {
        async fn send_to_group(&self, category: MessageCategory, text: &str) -> bool {
            self.sent.lock().push((category, text.to_string()));
            !self.reject.load(std::sync::atomic::Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
#[path = "messaging_tests.rs"]
mod tests;
