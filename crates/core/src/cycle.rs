//! Persistent cycle state and followups

use crate::event::{push_bounded, CycleEvent};
use crate::goal::{GoalId, Priority};
use crate::signal::Urgency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known K/V key under which [`CycleState`] is persisted.
pub const CYCLE_STATE_KEY: &str = "agent-loop";

/// Cooldown entries older than this are pruned after every cycle.
pub const COOLDOWN_RETENTION_MS: u64 = 24 * 3600 * 1000;

/// Cross-cycle "recent actions" window and cap.
pub const RECENT_ACTIONS_CAP: usize = 10;
pub const RECENT_ACTIONS_WINDOW_MS: u64 = 24 * 3600 * 1000;

/// Days of per-day cost history kept for the rolling average.
const COST_HISTORY_CAP: usize = 14;

/// A user-tagged unit of deferred work, re-surfaced with age-based
/// urgency escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Followup {
    pub topic: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<GoalId>,
}

impl Followup {
    /// Urgency after aging.
    ///
    /// Baseline is the parent goal's priority stepped down one tier
    /// (`Low` when the followup has no resolvable goal). Age adds one
    /// tier at 24 h and two at 48 h, clamped to `High` - a followup
    /// never reaches `Critical` on age alone.
    pub fn urgency(&self, parent_priority: Option<Priority>, now_ms: u64) -> Urgency {
        let baseline = parent_priority
            .map(|p| p.urgency().step_down())
            .unwrap_or(Urgency::Low);

        let age_ms = now_ms.saturating_sub(self.created_at);
        let steps = if age_ms >= 48 * 3600 * 1000 {
            2
        } else if age_ms >= 24 * 3600 * 1000 {
            1
        } else {
            0
        };

        let mut urgency = baseline;
        for _ in 0..steps {
            urgency = urgency.step_up();
        }
        urgency.min(Urgency::High)
    }
}

/// One remembered action for the cross-cycle context block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentAction {
    pub ts: u64,
    pub cycle: u64,
    pub text: String,
}

/// One day's accumulated spend, kept for the rolling average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCost {
    /// `YYYY-MM-DD` in the configured timezone.
    pub date: String,
    pub cost_usd: f64,
}

/// Durable supervisor state, persisted under [`CYCLE_STATE_KEY`] after
/// every cycle.
///
/// Every field defaults so that state files written by older builds
/// keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CycleState {
    /// Epoch ms of the last completed cycle.
    #[serde(default)]
    pub last_cycle_at: u64,
    /// Total cycles since first boot; the cross-cycle total order.
    #[serde(default)]
    pub cycle_count: u64,
    /// Consecutive cycles that invoked a backend; drives the backoff skip.
    #[serde(default)]
    pub consecutive_spawns: u32,
    /// Consecutive short "productive re-cycle" delays taken.
    #[serde(default)]
    pub consecutive_recycles: u32,
    #[serde(default)]
    pub pending_followups: Vec<Followup>,
    /// Signal keys picked in the previous cycle.
    #[serde(default)]
    pub last_signals: Vec<String>,
    #[serde(default)]
    pub daily_cost: f64,
    /// `YYYY-MM-DD` the daily bucket belongs to.
    #[serde(default)]
    pub daily_cost_date: String,
    #[serde(default)]
    pub daily_sonnet_cost: f64,
    #[serde(default)]
    pub daily_cost_history: Vec<DailyCost>,
    /// SignalKey → epoch ms the key last fired.
    #[serde(default)]
    pub signal_cooldowns: BTreeMap<String, u64>,
    /// Cycle count at which the self-imposed paid-tier cooldown lifts.
    ///
    /// Set on cost spikes to `cycle_count + clamp(2 * ceil(today /
    /// rolling_avg), 2, 12)`; cycle-count based so a restart cannot
    /// shorten it.
    #[serde(default)]
    pub sonnet_cooldown_until: u64,
    #[serde(default)]
    pub last_cycle_tokens: u64,
    #[serde(default)]
    pub last_cycle_file_touches: u32,
    /// Persisted tail of the event ring.
    #[serde(default)]
    pub recent_events: Vec<CycleEvent>,
    /// Last actions taken, for the composer's cross-cycle block and the
    /// hallucination audit.
    #[serde(default)]
    pub recent_actions: Vec<RecentAction>,
    /// Debounce for the cost-spike detector (6 h).
    #[serde(default)]
    pub last_cost_spike_signal_at: u64,
    /// Cooldown for direct error-spike alerts (1 h).
    #[serde(default)]
    pub last_error_spike_alert_at: u64,
    /// Rate limit for memory CRITICAL alerts.
    #[serde(default)]
    pub last_memory_alert_at: u64,
    /// Maintenance bookkeeping (wall-clock, epoch ms).
    #[serde(default)]
    pub last_weekly_rollup_at: u64,
    #[serde(default)]
    pub last_index_sync_at: u64,
    #[serde(default)]
    pub last_chronic_scan_at: u64,
}

impl CycleState {
    /// Reset the daily cost bucket when the date rolls over, archiving
    /// the finished day into the rolling history.
    pub fn roll_daily_cost(&mut self, today: &str) {
        if self.daily_cost_date == today {
            return;
        }
        if !self.daily_cost_date.is_empty() {
            self.daily_cost_history.push(DailyCost {
                date: std::mem::take(&mut self.daily_cost_date),
                cost_usd: self.daily_cost,
            });
            if self.daily_cost_history.len() > COST_HISTORY_CAP {
                let excess = self.daily_cost_history.len() - COST_HISTORY_CAP;
                self.daily_cost_history.drain(..excess);
            }
        }
        self.daily_cost_date = today.to_string();
        self.daily_cost = 0.0;
        self.daily_sonnet_cost = 0.0;
    }

    /// Rolling average of completed days. Zero when no history exists.
    pub fn rolling_avg_daily_cost(&self) -> f64 {
        if self.daily_cost_history.is_empty() {
            return 0.0;
        }
        let total: f64 = self.daily_cost_history.iter().map(|d| d.cost_usd).sum();
        total / self.daily_cost_history.len() as f64
    }

    /// Record spend for the current cycle.
    pub fn note_cost(&mut self, cost_usd: f64, paid_tier: bool) {
        self.daily_cost += cost_usd;
        if paid_tier {
            self.daily_sonnet_cost += cost_usd;
        }
    }

    /// Whether `key` is still inside its urgency's cooldown window.
    pub fn cooldown_blocks(&self, key: &str, urgency: Urgency, now_ms: u64) -> bool {
        let window = urgency.cooldown();
        if window.is_zero() {
            return false;
        }
        match self.signal_cooldowns.get(key) {
            Some(last) => now_ms.saturating_sub(*last) < window.as_millis() as u64,
            None => false,
        }
    }

    /// Stamp a picked signal's cooldown with this cycle's timestamp.
    pub fn stamp_cooldown(&mut self, key: &str, now_ms: u64) {
        self.signal_cooldowns.insert(key.to_string(), now_ms);
    }

    /// Drop cooldown entries older than 24 h.
    pub fn prune_cooldowns(&mut self, now_ms: u64) {
        self.signal_cooldowns
            .retain(|_, last| now_ms.saturating_sub(*last) <= COOLDOWN_RETENTION_MS);
    }

    /// Enqueue a followup, bounded by `max`. Returns false when full or
    /// when the topic is already pending.
    pub fn push_followup(&mut self, followup: Followup, max: usize) -> bool {
        if self.pending_followups.len() >= max {
            return false;
        }
        if self
            .pending_followups
            .iter()
            .any(|f| f.topic == followup.topic)
        {
            return false;
        }
        self.pending_followups.push(followup);
        true
    }

    /// Remove a followup by topic; returns whether one was removed.
    pub fn remove_followup(&mut self, topic: &str) -> bool {
        let before = self.pending_followups.len();
        self.pending_followups.retain(|f| f.topic != topic);
        self.pending_followups.len() != before
    }

    /// Record an event into the persisted ring.
    pub fn push_event(&mut self, event: CycleEvent) {
        push_bounded(&mut self.recent_events, event);
    }

    /// Remember an action for the cross-cycle context block, bounded to
    /// the last [`RECENT_ACTIONS_CAP`] within the 24 h window.
    pub fn push_action(&mut self, ts: u64, cycle: u64, text: impl Into<String>) {
        self.recent_actions.push(RecentAction {
            ts,
            cycle,
            text: text.into(),
        });
        self.recent_actions
            .retain(|a| ts.saturating_sub(a.ts) <= RECENT_ACTIONS_WINDOW_MS);
        if self.recent_actions.len() > RECENT_ACTIONS_CAP {
            let excess = self.recent_actions.len() - RECENT_ACTIONS_CAP;
            self.recent_actions.drain(..excess);
        }
    }

    /// Actions still inside the 24 h window, newest last.
    pub fn recent_actions_within(&self, now_ms: u64) -> Vec<&RecentAction> {
        self.recent_actions
            .iter()
            .filter(|a| now_ms.saturating_sub(a.ts) <= RECENT_ACTIONS_WINDOW_MS)
            .collect()
    }

    /// Whether the self-imposed paid-tier cooldown is active.
    pub fn sonnet_cooldown_active(&self) -> bool {
        self.cycle_count < self.sonnet_cooldown_until
    }
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod tests;
