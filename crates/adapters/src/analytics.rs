//! Error analytics consumed by the error-spike detector.
//!
//! The production store is SQLite-backed and owned by another
//! subsystem; the engine only needs spike detection and a prompt-ready
//! summary. An in-memory implementation ships for single-process
//! deployments and tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const HOUR_MS: u64 = 3_600_000;

/// A detected error spike: the most recent hour versus the hour before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSpike {
    pub recent_count: u64,
    pub prior_count: u64,
    /// Module with the most errors in the recent hour, for diagnostics.
    pub top_module: Option<String>,
}

impl ErrorSpike {
    /// Ratio of recent to prior, treating a zero prior hour as fully
    /// spiked.
    pub fn ratio(&self) -> f64 {
        if self.prior_count == 0 {
            return self.recent_count as f64;
        }
        self.recent_count as f64 / self.prior_count as f64
    }
}

/// Read interface over the error analytics store.
pub trait ErrorAnalytics: Send + Sync + 'static {
    /// Compare the most recent hour against the prior hour. `None`
    /// when the recent hour is quiet.
    fn detect_spike(&self, now_ms: u64) -> Option<ErrorSpike>;
    /// Prompt-ready summary of recent error patterns, grouped by module.
    fn summarize_for_agent(&self, now_ms: u64) -> String;
    /// Record one error occurrence.
    fn record_error(&self, module: &str, message: &str, ts: u64);
}

#[derive(Debug, Clone)]
struct ErrorRecord {
    ts: u64,
    module: String,
    message: String,
}

/// In-memory analytics bounded to the last 48 h of records.
#[derive(Clone, Default)]
pub struct MemoryErrorAnalytics {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl MemoryErrorAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counts_between(&self, from: u64, to: u64) -> (u64, HashMap<String, u64>) {
        let records = self.records.lock();
        let mut by_module: HashMap<String, u64> = HashMap::new();
        let mut total = 0;
        for r in records.iter().filter(|r| r.ts >= from && r.ts < to) {
            total += 1;
            *by_module.entry(r.module.clone()).or_default() += 1;
        }
        (total, by_module)
    }
}

impl ErrorAnalytics for MemoryErrorAnalytics {
    fn detect_spike(&self, now_ms: u64) -> Option<ErrorSpike> {
        let (recent, by_module) =
            self.counts_between(now_ms.saturating_sub(HOUR_MS), now_ms.saturating_add(1));
        if recent == 0 {
            return None;
        }
        let (prior, _) = self.counts_between(
            now_ms.saturating_sub(2 * HOUR_MS),
            now_ms.saturating_sub(HOUR_MS),
        );
        let top_module = by_module
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(module, _)| module);
        Some(ErrorSpike {
            recent_count: recent,
            prior_count: prior,
            top_module,
        })
    }

    fn summarize_for_agent(&self, now_ms: u64) -> String {
        let records = self.records.lock();
        let mut by_module: HashMap<&str, (u64, &str)> = HashMap::new();
        for r in records
            .iter()
            .filter(|r| now_ms.saturating_sub(r.ts) <= 24 * HOUR_MS)
        {
            let entry = by_module.entry(&r.module).or_insert((0, &r.message));
            entry.0 += 1;
            entry.1 = &r.message;
        }
        if by_module.is_empty() {
            return "no errors in the last 24h".to_string();
        }
        let mut lines: Vec<String> = by_module
            .into_iter()
            .map(|(module, (count, last))| format!("{module}: {count} errors, last: {last}"))
            .collect();
        lines.sort();
        lines.join("\n")
    }

    fn record_error(&self, module: &str, message: &str, ts: u64) {
        let mut records = self.records.lock();
        records.push(ErrorRecord {
            ts,
            module: module.to_string(),
            message: message.to_string(),
        });
        // Bound the buffer to the analysis window
        records.retain(|r| ts.saturating_sub(r.ts) <= 48 * HOUR_MS);
    }
}

#[cfg(test)]
#[path = "analytics_tests.rs"]
mod tests;
