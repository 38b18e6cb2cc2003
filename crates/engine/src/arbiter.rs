//! Signal arbiter: correlation, cooldown filtering, aging escalation,
//! scarcity-preserving selection, and cooldown stamping.

use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, Signal, Urgency};
use std::collections::HashSet;
use tracing::debug;

/// At most this many signals reach the model per cycle.
pub const MAX_PICKED: usize = 2;
/// At most this many picked signals may require the paid tier.
pub const MAX_SONNET_PICKED: usize = 1;

/// A `low` signal whose `last_check_at` is older than this is promoted
/// one tier for sorting, so perpetually deferred classes eventually
/// surface.
const AGING_ESCALATION_MS: u64 = 4 * 24 * 3_600_000;

/// API-call volume above which a cost-downgrade hint is urgent.
const HIGH_CALL_VOLUME: u64 = 50;

/// Signal types that require the paid tier. Modules extend this set.
pub fn core_sonnet_types() -> HashSet<String> {
    [types::GOAL_WORK, types::FOLLOWUP]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Post-hoc correlation (spec'd pairings), run before picking so the
/// synthesised signals are themselves candidates.
pub fn correlate(signals: &mut Vec<Signal>, world: &WorldSnapshot) {
    fn has(signals: &[Signal], t: &str) -> bool {
        signals.iter().any(|s| s.signal_type == t)
    }

    if has(signals, types::STALE_GOAL) && has(signals, types::CONVERSATION_GAP) {
        let goal_id = signals
            .iter()
            .find(|s| s.signal_type == types::STALE_GOAL)
            .and_then(|s| s.goal_id().map(str::to_string));
        let mut signal = Signal::new(
            types::USER_DISENGAGED,
            Urgency::High,
            "stale goal while the user has gone quiet",
        );
        if let Some(goal_id) = goal_id {
            signal = signal.with("goal_id", goal_id);
        }
        signals.push(signal);
    }

    if has(signals, types::MEMORY_PRESSURE) && has(signals, types::ERROR_SPIKE) {
        signals.push(Signal::new(
            types::SYSTEM_INCIDENT,
            Urgency::High,
            "memory pressure and an error spike at the same time",
        ));
    }

    if has(signals, types::COST_SPIKE) {
        let urgency = if world.api_calls_today > HIGH_CALL_VOLUME {
            Urgency::High
        } else {
            Urgency::Medium
        };
        signals.push(
            Signal::new(
                types::COST_DOWNGRADE_HINT,
                urgency,
                "consider routing qualifying work to a free backend",
            )
            .with("api_calls_today", world.api_calls_today),
        );
    }

    // Re-index after synthesis so ties still break deterministically
    for (index, signal) in signals.iter_mut().enumerate() {
        signal.index = index;
    }
}

/// Urgency used for sorting: aging escalation promotes stale `low`
/// signals one tier.
fn effective_urgency(signal: &Signal, now_ms: u64) -> Urgency {
    if signal.urgency == Urgency::Low {
        if let Some(last_check) = signal.last_check_at() {
            if now_ms.saturating_sub(last_check) > AGING_ESCALATION_MS {
                return Urgency::Medium;
            }
        }
    }
    signal.urgency
}

/// Outcome of selection.
#[derive(Debug, Default)]
pub struct PickOutcome {
    pub picked: Vec<Signal>,
    /// Candidates dropped by the cooldown filter (re-eligible next
    /// cycle; their cooldowns are not stamped).
    pub cooled_down: usize,
}

/// Select the signals that reach the model this cycle and stamp their
/// cooldowns.
pub fn pick(
    signals: Vec<Signal>,
    state: &mut CycleState,
    now_ms: u64,
    sonnet_types: &HashSet<String>,
) -> PickOutcome {
    let total = signals.len();
    let mut candidates: Vec<Signal> = signals
        .into_iter()
        .filter(|s| !state.cooldown_blocks(&s.key(), s.urgency, now_ms))
        .collect();
    let cooled_down = total - candidates.len();

    candidates.sort_by(|a, b| {
        effective_urgency(b, now_ms)
            .cmp(&effective_urgency(a, now_ms))
            .then(a.index.cmp(&b.index))
    });

    let is_sonnet = |s: &Signal| sonnet_types.contains(&s.signal_type);
    let mut picked: Vec<Signal> = Vec::new();
    let mut skipped: Vec<Signal> = Vec::new();
    for signal in candidates {
        if picked.len() >= MAX_PICKED {
            skipped.push(signal);
            continue;
        }
        let sonnet_count = picked.iter().filter(|s| is_sonnet(s)).count();
        if is_sonnet(&signal) && sonnet_count >= MAX_SONNET_PICKED {
            skipped.push(signal);
            continue;
        }
        picked.push(signal);
    }

    // Diversity swap: two picks in one tier starve the lower tiers, so
    // the second slot yields to the best lower-tier candidate.
    if picked.len() == MAX_PICKED {
        let first_tier = effective_urgency(&picked[0], now_ms);
        let second_tier = effective_urgency(&picked[1], now_ms);
        if first_tier == second_tier {
            let first_is_sonnet = is_sonnet(&picked[0]);
            if let Some(pos) = skipped.iter().position(|s| {
                effective_urgency(s, now_ms) < first_tier
                    && !(first_is_sonnet && is_sonnet(s))
            }) {
                let replacement = skipped.remove(pos);
                debug!(
                    dropped = %picked[1].key(),
                    promoted = %replacement.key(),
                    "diversity swap"
                );
                picked[1] = replacement;
            }
        }
    }

    // Only picked signals burn their cooldown; filtered-but-unpicked
    // ones stay eligible next cycle
    for signal in &picked {
        state.stamp_cooldown(&signal.key(), now_ms);
    }
    state.prune_cooldowns(now_ms);
    state.last_signals = picked.iter().map(|s| s.key()).collect();

    PickOutcome { picked, cooled_down }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;
