//! Bounded cycle event log with live + persisted views

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum events retained, both in the live buffer and in CycleState.
pub const EVENT_RING_CAP: usize = 50;

/// Well-known event names.
pub mod names {
    pub const CYCLE_COMPLETE: &str = "cycle:complete";
    pub const CYCLE_ERROR: &str = "cycle:error";
    pub const CYCLE_SKIP: &str = "cycle:skip";
    pub const CYCLE_SIGNALS: &str = "agent:cycle:signals";
    pub const CYCLE_BACKOFF: &str = "agent:cycle:backoff";
    pub const MESSAGE_SENT: &str = "agent:message:sent";
    pub const MESSAGE_SUPPRESSED: &str = "agent:message:suppressed";
    pub const SESSION_RESET: &str = "agent:session:reset";
    pub const ALERT_SENT: &str = "agent:alert:sent";
}

/// One typed event in the per-cycle ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEvent {
    pub event: String,
    /// Epoch milliseconds.
    pub ts: u64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl CycleEvent {
    pub fn new(event: impl Into<String>, ts: u64) -> Self {
        Self {
            event: event.into(),
            ts,
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Push an event into a bounded ring, dropping the oldest past the cap.
pub fn push_bounded(ring: &mut Vec<CycleEvent>, event: CycleEvent) {
    ring.push(event);
    if ring.len() > EVENT_RING_CAP {
        let excess = ring.len() - EVENT_RING_CAP;
        ring.drain(..excess);
    }
}

/// Merge the live buffer with the persisted tail.
///
/// Deduplicates on `(event, ts)` and returns events sorted by timestamp,
/// bounded to the ring cap (newest win). Persisted state lags the live
/// buffer, so overlap is expected rather than exceptional.
pub fn merge_events(live: &[CycleEvent], persisted: &[CycleEvent]) -> Vec<CycleEvent> {
    let mut merged: Vec<CycleEvent> = Vec::with_capacity(live.len() + persisted.len());
    for ev in persisted.iter().chain(live.iter()) {
        if !merged.iter().any(|m| m.event == ev.event && m.ts == ev.ts) {
            merged.push(ev.clone());
        }
    }
    merged.sort_by_key(|e| e.ts);
    if merged.len() > EVENT_RING_CAP {
        let excess = merged.len() - EVENT_RING_CAP;
        merged.drain(..excess);
    }
    merged
}

/// Process-local live event buffer.
///
/// Held by the supervisor; the dashboard sees read-only snapshots merged
/// with the persisted tail.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<CycleEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: CycleEvent) {
        push_bounded(&mut self.events, event);
    }

    /// Read-only view of the live buffer.
    pub fn snapshot(&self) -> &[CycleEvent] {
        &self.events
    }

    /// Public query view: live merged with the persisted tail.
    pub fn merged_with(&self, persisted: &[CycleEvent]) -> Vec<CycleEvent> {
        merge_events(&self.events, persisted)
    }

    /// Events of a given name newer than `since_ms`.
    pub fn count_since(&self, event: &str, since_ms: u64) -> usize {
        self.events
            .iter()
            .filter(|e| e.event == event && e.ts >= since_ms)
            .count()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
