//! Out-of-band alert sink (Telegram).
//!
//! Used for direct alerts that bypass the normal message routing:
//! error spikes, memory CRITICAL, auto-coder failures.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from notify operations.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Adapter for out-of-band alerts.
#[async_trait]
pub trait Notify: Send + Sync + 'static {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

/// Telegram bot sink.
pub struct TelegramNotify {
    token: String,
    chat_id: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl TelegramNotify {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[async_trait]
impl Notify for TelegramNotify {
    async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let text = format!("{title}\n{message}");
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({"chat_id": self.chat_id, "text": text}))
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(NotifyError::SendFailed(response.status().to_string()));
        }
        Ok(())
    }
}

/// Swallows alerts; used when no sink is configured.
#[derive(Clone, Default)]
pub struct NoOpNotify;

#[async_trait]
impl Notify for NoOpNotify {
    async fn notify(&self, title: &str, _message: &str) -> Result<(), NotifyError> {
        debug!(title, "notify disabled, dropping alert");
        Ok(())
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotify;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records alerts for assertions.
    #[derive(Clone, Default)]
    pub struct FakeNotify {
        alerts: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl FakeNotify {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn alerts(&self) -> Vec<(String, String)> {
            self.alerts.lock().clone()
        }
    }

    #[async_trait]
    impl Notify for FakeNotify {
        async fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
            self.alerts.lock().push((title.to_string(), message.to_string()));
            Ok(())
        }
    }
}
