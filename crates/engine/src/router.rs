//! Backend router: tiered selection, the tool-use loop, and fallback.
//!
//! Paid (Sonnet-class) cycles run against the persistent session; free
//! cycles probe registered backends (local first, then hosted-free) and
//! fall back to the paid session when every free backend fails.

use crate::parser;
use minder_adapters::{
    BackendError, BackendKind, ChatOutcome, ChatRequest, LlmBackend, ReasoningSession, ToolBridge,
};
use minder_core::{CycleState, Directive, Signal, Urgency};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session reset thresholds.
pub const MAX_SESSION_TOKENS: u64 = 100_000;
pub const MAX_SESSION_CYCLES: u32 = 10;

/// Tool-use loop bound per invocation.
const MAX_TOOL_ROUNDS: usize = 5;

/// Keywords that mark a signal as code work worth the paid tier.
const CODE_KEYWORDS: &[&str] = &[
    "create", "build", "fix", "refactor", "implement", "debug", "write", "deploy", "optimize",
];

/// Which tier a cycle runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Paid,
    Free,
}

/// One executed tool call, for the audit trail.
#[derive(Debug, Clone)]
pub struct ToolLogEntry {
    pub name: String,
    pub params: Value,
    pub success: bool,
    pub output: String,
}

/// Aggregated result of one routed invocation (all tool rounds).
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Reply text across rounds, later rounds appended.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub model: String,
    pub backend_name: String,
    pub used_paid: bool,
    pub tool_log: Vec<ToolLogEntry>,
}

fn signal_mentions_code(signal: &Signal) -> bool {
    let mut haystack = signal.summary.to_lowercase();
    if let Some(topic) = signal.data.get("topic").and_then(Value::as_str) {
        haystack.push(' ');
        haystack.push_str(&topic.to_lowercase());
    }
    CODE_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

/// Pick the tier for this cycle's picked signals.
///
/// High/critical urgency or code-shaped work goes paid, unless the
/// self-imposed Sonnet cooldown is active.
pub fn choose_tier(picked: &[Signal], state: &CycleState) -> Tier {
    let qualifies = picked.iter().any(|s| {
        s.urgency >= Urgency::High || signal_mentions_code(s)
    });
    if !qualifies {
        return Tier::Free;
    }
    if state.sonnet_cooldown_active() {
        debug!(
            until = state.sonnet_cooldown_until,
            "qualifying signals held on free tier by sonnet cooldown"
        );
        return Tier::Free;
    }
    Tier::Paid
}

/// The router itself.
pub struct Router {
    backends: Vec<Arc<dyn LlmBackend>>,
    session: Arc<dyn ReasoningSession>,
    tools: Arc<dyn ToolBridge>,
}

impl Router {
    pub fn new(
        backends: Vec<Arc<dyn LlmBackend>>,
        session: Arc<dyn ReasoningSession>,
        tools: Arc<dyn ToolBridge>,
    ) -> Self {
        Self {
            backends,
            session,
            tools,
        }
    }

    pub fn session(&self) -> &Arc<dyn ReasoningSession> {
        &self.session
    }

    /// Reset the persistent session when any threshold holds. Returns
    /// whether a reset happened.
    pub fn maybe_reset_session(&self, prior_cycle_errored: bool) -> bool {
        let tokens = self.session.accumulated_tokens();
        let cycles = self.session.cycles_since_reset();
        if tokens > MAX_SESSION_TOKENS || cycles >= MAX_SESSION_CYCLES || prior_cycle_errored {
            info!(tokens, cycles, prior_cycle_errored, "resetting persistent session");
            self.session.reset();
            return true;
        }
        false
    }

    /// Invoke the chosen tier, running the tool-use loop to completion.
    pub async fn invoke(
        &self,
        prompt: &str,
        tier: Tier,
        timeout: Duration,
    ) -> Result<Invocation, BackendError> {
        match tier {
            Tier::Paid => self.run_paid(prompt, timeout).await,
            Tier::Free => match self.select_free_backend().await {
                Some(backend) => match self.run_free(backend.as_ref(), prompt, timeout).await {
                    Ok(invocation) => Ok(invocation),
                    Err(e) => {
                        warn!(error = %e, "free backend failed, falling back to paid session");
                        self.run_paid(prompt, timeout).await
                    }
                },
                None => {
                    debug!("no healthy free backend, using paid session");
                    self.run_paid(prompt, timeout).await
                }
            },
        }
    }

    /// First healthy free backend, local before hosted-free.
    async fn select_free_backend(&self) -> Option<Arc<dyn LlmBackend>> {
        let mut ordered: Vec<&Arc<dyn LlmBackend>> = self
            .backends
            .iter()
            .filter(|b| b.kind() != BackendKind::Paid)
            .collect();
        ordered.sort_by_key(|b| b.kind());
        for backend in ordered {
            if backend.probe().await {
                return Some(Arc::clone(backend));
            }
            debug!(backend = backend.name(), "probe failed, trying next");
        }
        None
    }

    async fn run_paid(&self, prompt: &str, timeout: Duration) -> Result<Invocation, BackendError> {
        let mut aggregate = Invocation {
            text: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            model: self.session.model(),
            backend_name: "session".to_string(),
            used_paid: true,
            tool_log: Vec::new(),
        };
        let mut next_message = prompt.to_string();
        for _round in 0..MAX_TOOL_ROUNDS {
            let mut req = ChatRequest::new(next_message.clone());
            req.timeout = timeout;
            let outcome = self.session.chat(req).await?;
            let tool_calls = absorb_round(&mut aggregate, &outcome);
            if tool_calls.is_empty() {
                return Ok(aggregate);
            }
            next_message = self.execute_tools(&mut aggregate, tool_calls).await;
        }
        Ok(aggregate)
    }

    async fn run_free(
        &self,
        backend: &dyn LlmBackend,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Invocation, BackendError> {
        let mut aggregate = Invocation {
            text: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            cost_usd: 0.0,
            model: backend.model().to_string(),
            backend_name: backend.name().to_string(),
            used_paid: false,
            tool_log: Vec::new(),
        };
        // Free backends are stateless, so the loop threads a transcript
        let mut transcript = prompt.to_string();
        for _round in 0..MAX_TOOL_ROUNDS {
            let mut req = ChatRequest::new(transcript.clone());
            req.timeout = timeout;
            let outcome = backend.chat(req).await?;
            let tool_calls = absorb_round(&mut aggregate, &outcome);
            if tool_calls.is_empty() {
                return Ok(aggregate);
            }
            let results = self.execute_tools(&mut aggregate, tool_calls).await;
            transcript = format!("{transcript}\n\nAssistant:\n{}\n\n{results}", outcome.text);
        }
        Ok(aggregate)
    }

    /// Run one round's tool calls and format the synthetic results turn.
    async fn execute_tools(
        &self,
        aggregate: &mut Invocation,
        tool_calls: Vec<(String, Value)>,
    ) -> String {
        let mut results = String::from("Tool results:\n");
        for (name, params) in tool_calls {
            let result = self.tools.execute_tool(&name, &params).await;
            if result.success {
                results.push_str(&format!(
                    "<tool_result name=\"{name}\">{}</tool_result>\n",
                    result.output
                ));
            } else {
                results.push_str(&format!(
                    "<tool_result name=\"{name}\">Error: {}</tool_result>\n",
                    result.output
                ));
            }
            aggregate.tool_log.push(ToolLogEntry {
                name,
                params,
                success: result.success,
                output: result.output,
            });
        }
        results
    }
}

/// Fold one round's outcome into the aggregate; return its tool calls.
fn absorb_round(aggregate: &mut Invocation, outcome: &ChatOutcome) -> Vec<(String, Value)> {
    if !aggregate.text.is_empty() {
        aggregate.text.push('\n');
    }
    aggregate.text.push_str(&outcome.text);
    aggregate.input_tokens += outcome.input_tokens;
    aggregate.output_tokens += outcome.output_tokens;
    aggregate.cost_usd += outcome.cost_usd;

    parser::parse(&outcome.text)
        .directives
        .into_iter()
        .filter_map(|d| match d {
            Directive::ToolCall { name, params } => {
                let value = match params.as_json() {
                    Some(v) => v.clone(),
                    // Malformed params still reach the tool so it can
                    // answer with a descriptive error
                    None => serde_json::json!({"_malformed": true}),
                };
                Some((name, value))
            }
            _ => None,
        })
        .collect()
}

/// Sonnet-requiring types: the core set plus module extensions.
pub fn sonnet_types(modules: &[Box<dyn crate::module::AgentModule>]) -> HashSet<String> {
    let mut set = crate::arbiter::core_sonnet_types();
    for module in modules {
        set.extend(module.sonnet_signal_types());
    }
    set
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
