//! Per-cycle audit records

use serde::{Deserialize, Serialize};

/// Diff of one file modified during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub diff: String,
}

/// Per-cycle audit record, persisted for offline review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleDiff {
    pub cycle: u64,
    pub ts: u64,
    pub model: String,
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bash_commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDiff>,
    /// Flipped by the dashboard once a human has looked at the cycle.
    #[serde(default)]
    pub reviewed: bool,
}

impl CycleDiff {
    pub fn new(cycle: u64, ts: u64, model: impl Into<String>, cost: f64) -> Self {
        Self {
            cycle,
            ts,
            model: model.into(),
            cost,
            actions: Vec::new(),
            bash_commands: Vec::new(),
            files: Vec::new(),
            reviewed: false,
        }
    }
}
