//! The read-only world snapshot handed to detectors and the composer.
//!
//! The supervisor assembles one snapshot per cycle from the goal store,
//! cycle state and the collaborating subsystems, so detectors stay pure
//! functions over it.

use chrono::NaiveDate;
use minder_adapters::ErrorSpike;
use minder_core::{Followup, Goal};
use serde::{Deserialize, Serialize};

/// Memory pressure tier reported by the process health checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    #[default]
    Normal,
    Warn,
    Shed,
    Critical,
    Restart,
}

/// Process memory health.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct MemoryStats {
    pub tier: MemoryTier,
    pub heap_bytes: u64,
    pub rss_bytes: u64,
}

/// Health record for one registered cron.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CronHealth {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub consecutive_errors: u32,
    pub deliveries: u64,
    /// Fraction of deliveries the user engaged with.
    pub engagement_rate: f64,
}

/// One memory item tracked by the external memory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub tier: String,
    pub last_accessed_at: u64,
}

/// Reachability of the external memory service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct McpStatus {
    pub reachable: bool,
    pub consecutive_failures: u32,
}

/// One running workflow, for the plan-stuck detector.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkflowState {
    pub id: String,
    pub name: String,
    pub started_at: u64,
    pub current_step_started_at: u64,
    pub max_duration_ms: u64,
}

/// A recurring error-recovery pattern, for the self-improvement
/// detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPattern {
    pub pattern: String,
    pub occurrences_last_week: u32,
}

/// One content keyword observation, for the pattern detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordObservation {
    pub keyword: String,
    pub ts: u64,
}

/// An open or concluded hypothesis, for the composer block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisSummary {
    pub id: String,
    pub text: String,
    pub open: bool,
}

/// Everything a cycle can observe, frozen at collection time.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub now_ms: u64,
    /// Calendar date in the configured timezone.
    pub today: NaiveDate,
    /// Local wall-clock hour in the configured timezone.
    pub local_hour: u32,
    pub quiet: bool,
    pub goals: Vec<Goal>,
    pub followups: Vec<Followup>,
    pub crons: Vec<CronHealth>,
    pub memory: MemoryStats,
    pub memories: Vec<MemoryRecord>,
    pub mcp: McpStatus,
    pub error_spike: Option<ErrorSpike>,
    /// Prompt-ready error summary; rendered only when an error spike is
    /// picked.
    pub error_summary: Option<String>,
    pub last_inbound_message_at: Option<u64>,
    /// Mtime of the bot-authored memory file.
    pub bot_memory_modified_at: Option<u64>,
    pub workflows: Vec<WorkflowState>,
    pub recovery_patterns: Vec<RecoveryPattern>,
    pub content_keywords: Vec<KeywordObservation>,
    pub api_calls_today: u64,
    pub cost_tracking_enabled: bool,
    /// 30-day pattern insights for the composer.
    pub pattern_insights: Vec<String>,
    pub learning_notes: Vec<String>,
    pub hypotheses: Vec<HypothesisSummary>,
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self {
            now_ms: 0,
            today: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
            local_hour: 12,
            quiet: false,
            goals: Vec::new(),
            followups: Vec::new(),
            crons: Vec::new(),
            memory: MemoryStats::default(),
            memories: Vec::new(),
            mcp: McpStatus {
                reachable: true,
                consecutive_failures: 0,
            },
            error_spike: None,
            error_summary: None,
            last_inbound_message_at: None,
            bot_memory_modified_at: None,
            workflows: Vec::new(),
            recovery_patterns: Vec::new(),
            content_keywords: Vec::new(),
            api_calls_today: 0,
            cost_tracking_enabled: true,
            pattern_insights: Vec::new(),
            learning_notes: Vec::new(),
            hypotheses: Vec::new(),
        }
    }
}

/// Extra world state supplied by collaborating subsystems each cycle.
/// The supervisor merges this with goals, followups and the clock.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorldExtras {
    pub crons: Vec<CronHealth>,
    pub memory: MemoryStats,
    pub memories: Vec<MemoryRecord>,
    pub mcp: McpStatus,
    pub last_inbound_message_at: Option<u64>,
    pub bot_memory_modified_at: Option<u64>,
    pub workflows: Vec<WorkflowState>,
    pub recovery_patterns: Vec<RecoveryPattern>,
    pub content_keywords: Vec<KeywordObservation>,
    pub api_calls_today: u64,
    pub pattern_insights: Vec<String>,
    pub learning_notes: Vec<String>,
    pub hypotheses: Vec<HypothesisSummary>,
}

/// Source of [`WorldExtras`]; implemented over the real subsystems by
/// the daemon and by static fixtures in tests.
pub trait WorldProvider: Send + Sync + 'static {
    fn extras(&self, now_ms: u64) -> WorldExtras;
}

/// A fixed snapshot source.
#[derive(Debug, Clone, Default)]
pub struct StaticWorldProvider {
    pub extras: WorldExtras,
}

impl WorldProvider for StaticWorldProvider {
    fn extras(&self, _now_ms: u64) -> WorldExtras {
        self.extras.clone()
    }
}

impl MemoryTier {
    pub fn label(&self) -> &'static str {
        match self {
            MemoryTier::Normal => "NORMAL",
            MemoryTier::Warn => "WARN",
            MemoryTier::Shed => "SHED",
            MemoryTier::Critical => "CRITICAL",
            MemoryTier::Restart => "RESTART",
        }
    }
}
