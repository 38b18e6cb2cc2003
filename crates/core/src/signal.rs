//! Signals: zero-cost observations requesting the model's attention

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Ordinal urgency used for selection and prompt labelling.
///
/// Ordering is `Low < Medium < High < Critical`, so sorting descending
/// puts the most urgent signals first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Cooldown window for a repeat of the same signal key.
    pub fn cooldown(&self) -> Duration {
        match self {
            Urgency::Low => Duration::from_secs(3 * 3600),
            Urgency::Medium => Duration::from_secs(3600),
            Urgency::High | Urgency::Critical => Duration::ZERO,
        }
    }

    /// One tier up, saturating at `Critical`.
    pub fn step_up(&self) -> Urgency {
        match self {
            Urgency::Low => Urgency::Medium,
            Urgency::Medium => Urgency::High,
            Urgency::High | Urgency::Critical => Urgency::Critical,
        }
    }

    /// One tier down, saturating at `Low`.
    pub fn step_down(&self) -> Urgency {
        match self {
            Urgency::Critical => Urgency::High,
            Urgency::High => Urgency::Medium,
            Urgency::Medium | Urgency::Low => Urgency::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Well-known signal types emitted by the core detectors.
///
/// The type field stays an open string because registered modules
/// contribute their own types (e.g. `transfer_deadline`).
pub mod types {
    pub const STALE_GOAL: &str = "stale_goal";
    pub const BLOCKED_GOAL: &str = "blocked_goal";
    pub const DEADLINE_APPROACHING: &str = "deadline_approaching";
    pub const FAILING_CRON: &str = "failing_cron";
    pub const FOLLOWUP: &str = "followup";
    pub const COST_SPIKE: &str = "cost_spike";
    pub const MEMORY_PRESSURE: &str = "memory_pressure";
    pub const MCP_DISCONNECTED: &str = "mcp_disconnected";
    pub const ERROR_SPIKE: &str = "error_spike";
    pub const CONVERSATION_GAP: &str = "conversation_gap";
    pub const STALE_MEMORY: &str = "stale_memory";
    pub const LOW_ENGAGEMENT_CRON: &str = "low_engagement_cron";
    pub const STALE_BOT_MEMORY: &str = "stale_bot_memory";
    pub const GOAL_WORK: &str = "goal_work";
    pub const COMPOUND: &str = "compound";
    pub const CYCLE_ANOMALY: &str = "cycle_anomaly";
    pub const IDLE_TIME: &str = "idle_time";
    pub const CHAIN_OPPORTUNITY: &str = "chain_opportunity";
    pub const SELF_IMPROVEMENT: &str = "self_improvement";
    pub const PATTERN_OBSERVED: &str = "pattern_observed";
    pub const PLAN_STUCK: &str = "plan_stuck";
    pub const USER_DISENGAGED: &str = "user_disengaged";
    pub const SYSTEM_INCIDENT: &str = "system_incident";
    pub const COST_DOWNGRADE_HINT: &str = "cost_downgrade_hint";
    pub const TRANSFER_DEADLINE: &str = "transfer_deadline";
}

/// A detected condition worth surfacing to the model.
///
/// Signals are immutable once emitted and live only for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: String,
    pub urgency: Urgency,
    /// Human-readable one-liner, kept short for prompt budgets.
    pub summary: String,
    /// Free-form payload used for keying, routing and brief building.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, Value>,
    /// Insertion index within the cycle; breaks sorting ties.
    #[serde(default, skip_serializing)]
    pub index: usize,
}

/// Data keys consulted, in order, when deriving a [`Signal::key`].
const KEY_FIELDS: &[&str] = &["goal_id", "cron_id", "memory_id", "topic", "module", "path"];

impl Signal {
    pub fn new(signal_type: impl Into<String>, urgency: Urgency, summary: impl Into<String>) -> Self {
        Self {
            signal_type: signal_type.into(),
            urgency,
            summary: summary.into(),
            data: serde_json::Map::new(),
            index: 0,
        }
    }

    /// Attach a data field, chaining.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Stable identifier used for cooldown bookkeeping.
    ///
    /// Two signals sharing a key are the same issue. A signal whose data
    /// carries none of the known key fields falls back to its type, so
    /// repeated emissions share one cooldown entry.
    pub fn key(&self) -> String {
        for field in KEY_FIELDS {
            if let Some(v) = self.data.get(*field) {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if !v.is_empty() {
                    return format!("{}:{}", self.signal_type, v);
                }
            }
        }
        self.signal_type.clone()
    }

    /// The goal this signal is about, if any.
    pub fn goal_id(&self) -> Option<&str> {
        self.data.get("goal_id").and_then(Value::as_str)
    }

    /// Wall-clock of the last check recorded by the detector, if any.
    /// Used by the arbiter's aging escalation.
    pub fn last_check_at(&self) -> Option<u64> {
        self.data.get("last_check_at").and_then(Value::as_u64)
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
