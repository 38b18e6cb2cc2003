//! Trust and learning contracts.
//!
//! The dispatcher depends on these small traits instead of concrete
//! subsystems, which keeps the trust engine, confidence gate and
//! learning journal free of import cycles. Wired at startup.

use crate::world::WorldSnapshot;
use async_trait::async_trait;
use minder_core::{Directive, JsonBody};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Scores a risky directive 0..=10.
pub trait GateEvaluator: Send + Sync + 'static {
    fn score(&self, directive: &Directive, world: &WorldSnapshot) -> u8;
}

/// Final say on whether a gate-approved directive may run.
pub trait TrustEvaluator: Send + Sync + 'static {
    fn allows(&self, directive: &Directive, score: u8) -> bool;
}

/// Sink for journal-shaped directives.
pub trait LearningStore: Send + Sync + 'static {
    fn record_lesson(&self, text: &str, now_ms: u64);
    fn record_gap(&self, topic: &str, text: &str, now_ms: u64);
    fn record_hypothesis(&self, text: &str, now_ms: u64);
    fn record_evidence(&self, hypothesis_id: &str, text: &str, now_ms: u64);
    fn conclude(&self, hypothesis_id: &str, text: &str, now_ms: u64);
    fn record_experiment(&self, spec: &Value, now_ms: u64);
    fn record_skill(&self, name: &str, category: &str, description: &str, now_ms: u64);
}

/// Narrow interface to the workflow runtime.
#[async_trait]
pub trait ChainRunner: Send + Sync + 'static {
    /// Start a workflow; returns its id or a descriptive error.
    async fn start_chain(&self, plan: &JsonBody) -> Result<String, String>;
}

/// Gate with a fixed score, for deployments without a trust engine and
/// for tests.
#[derive(Clone)]
pub struct StaticGate {
    pub score: u8,
}

impl GateEvaluator for StaticGate {
    fn score(&self, _directive: &Directive, _world: &WorldSnapshot) -> u8 {
        self.score
    }
}

/// Trusts anything the gate approved.
#[derive(Clone, Default)]
pub struct PermissiveTrust;

impl TrustEvaluator for PermissiveTrust {
    fn allows(&self, _directive: &Directive, _score: u8) -> bool {
        true
    }
}

/// In-memory learning journal; the daemon flushes it into the K/V
/// store between cycles.
#[derive(Clone, Default)]
pub struct MemoryLearningStore {
    entries: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemoryLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(kind, text)` pairs recorded so far.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }

    fn push(&self, kind: &str, text: String) {
        self.entries.lock().push((kind.to_string(), text));
    }
}

impl LearningStore for MemoryLearningStore {
    fn record_lesson(&self, text: &str, _now_ms: u64) {
        self.push("lesson", text.to_string());
    }

    fn record_gap(&self, topic: &str, text: &str, _now_ms: u64) {
        self.push("gap", format!("{topic}: {text}"));
    }

    fn record_hypothesis(&self, text: &str, _now_ms: u64) {
        self.push("hypothesis", text.to_string());
    }

    fn record_evidence(&self, hypothesis_id: &str, text: &str, _now_ms: u64) {
        self.push("evidence", format!("{hypothesis_id}: {text}"));
    }

    fn conclude(&self, hypothesis_id: &str, text: &str, _now_ms: u64) {
        self.push("conclusion", format!("{hypothesis_id}: {text}"));
    }

    fn record_experiment(&self, spec: &Value, _now_ms: u64) {
        self.push("experiment", spec.to_string());
    }

    fn record_skill(&self, name: &str, category: &str, description: &str, _now_ms: u64) {
        self.push("skill", format!("{name} [{category}]: {description}"));
    }
}

/// Refuses every chain start; used when no workflow runtime is wired.
#[derive(Clone, Default)]
pub struct NoChainRunner;

#[async_trait]
impl ChainRunner for NoChainRunner {
    async fn start_chain(&self, _plan: &JsonBody) -> Result<String, String> {
        Err("workflow runtime not configured".to_string())
    }
}
