//! Tool bridge: the narrow interface to tool implementations.
//!
//! Real tools (file I/O, shell, HTTP) live outside the engine; the
//! router's tool-use loop and the dispatcher only see this trait.

use async_trait::async_trait;
use serde_json::Value;

/// Outcome of one tool invocation. Tool failure is data, not an error:
/// it is returned to the model as a `<tool_result>` on the next turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Adapter over the tool runtime.
#[async_trait]
pub trait ToolBridge: Send + Sync + 'static {
    async fn execute_tool(&self, name: &str, params: &Value) -> ToolResult;
    fn list_tools(&self) -> Vec<String>;
}

/// Rejects every tool call; used when no tool runtime is wired.
#[derive(Clone, Default)]
pub struct NoOpToolBridge;

#[async_trait]
impl ToolBridge for NoOpToolBridge {
    async fn execute_tool(&self, name: &str, _params: &Value) -> ToolResult {
        ToolResult::error(format!("unknown tool: {name}"))
    }

    fn list_tools(&self) -> Vec<String> {
        Vec::new()
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeToolBridge;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted tool bridge that records invocations.
    #[derive(Clone, Default)]
    pub struct FakeToolBridge {
        results: Arc<Mutex<HashMap<String, ToolResult>>>,
        calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl FakeToolBridge {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the result for a tool name. Unscripted tools succeed
        /// with an empty output.
        pub fn script(&self, name: &str, result: ToolResult) {
            self.results.lock().insert(name.to_string(), result);
        }

        pub fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ToolBridge for FakeToolBridge {
        async fn execute_tool(&self, name: &str, params: &Value) -> ToolResult {
            self.calls.lock().push((name.to_string(), params.clone()));
            self.results
                .lock()
                .get(name)
                .cloned()
                .unwrap_or_else(|| ToolResult::ok(""))
        }

        fn list_tools(&self) -> Vec<String> {
            self.results.lock().keys().cloned().collect()
        }
    }
}
