//! Activity heuristics: conversation gaps, cycle anomalies, idle time,
//! recurring content patterns and self-improvement opportunities.

use crate::world::WorldSnapshot;
use minder_core::{event::names, signal::types, CycleState, Signal, Urgency};
use std::collections::BTreeMap;

const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 24 * HOUR_MS;
/// Pattern-observed cap per cycle.
const PATTERN_CAP: usize = 3;

/// No inbound user message for 18 h, outside quiet hours.
pub fn conversation_gap(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    if world.quiet {
        return Vec::new();
    }
    let Some(last_inbound) = world.last_inbound_message_at else {
        return Vec::new();
    };
    let age_ms = world.now_ms.saturating_sub(last_inbound);
    if age_ms < 18 * HOUR_MS {
        return Vec::new();
    }
    vec![Signal::new(
        types::CONVERSATION_GAP,
        Urgency::Low,
        format!(
            "no user messages for {}",
            minder_core::format_elapsed_ms(age_ms)
        ),
    )
    .with("last_check_at", last_inbound)]
}

fn count_recent(state: &CycleState, event: &str, now_ms: u64, window_ms: u64) -> usize {
    state
        .recent_events
        .iter()
        .filter(|e| e.event == event && now_ms.saturating_sub(e.ts) <= window_ms)
        .count()
}

/// Recent-event heuristics: error bursts, backoff churn, idle time.
pub fn cycle_anomalies(world: &WorldSnapshot, state: &mut CycleState) -> Vec<Signal> {
    let mut signals = Vec::new();

    let errors = count_recent(state, names::CYCLE_ERROR, world.now_ms, HOUR_MS);
    if errors >= 3 {
        signals.push(Signal::new(
            types::CYCLE_ANOMALY,
            Urgency::High,
            format!("{errors} cycle errors in the last hour"),
        ));
    }

    let backoffs = count_recent(state, names::CYCLE_BACKOFF, world.now_ms, HOUR_MS);
    if backoffs >= 2 {
        signals.push(Signal::new(
            types::CYCLE_ANOMALY,
            Urgency::Medium,
            format!("{backoffs} backoffs in the last hour"),
        ));
    }

    if !world.quiet && state.last_cycle_at > 0 {
        let idle_ms = world.now_ms.saturating_sub(state.last_cycle_at);
        if idle_ms >= 3 * HOUR_MS {
            let urgency = if idle_ms >= 6 * HOUR_MS {
                Urgency::Medium
            } else {
                Urgency::Low
            };
            signals.push(Signal::new(
                types::IDLE_TIME,
                urgency,
                format!("no cycle for {}", minder_core::format_elapsed_ms(idle_ms)),
            ));
        }
    }
    signals
}

/// Same content keyword surfacing on three distinct days in a week.
pub fn patterns_observed(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    let mut days_by_keyword: BTreeMap<&str, std::collections::BTreeSet<u64>> = BTreeMap::new();
    for obs in &world.content_keywords {
        if world.now_ms.saturating_sub(obs.ts) > 7 * DAY_MS {
            continue;
        }
        days_by_keyword
            .entry(obs.keyword.as_str())
            .or_default()
            .insert(obs.ts / DAY_MS);
    }
    days_by_keyword
        .into_iter()
        .filter(|(_, days)| days.len() >= 3)
        .take(PATTERN_CAP)
        .map(|(keyword, days)| {
            Signal::new(
                types::PATTERN_OBSERVED,
                Urgency::Low,
                format!("\"{keyword}\" came up on {} days this week", days.len()),
            )
            .with("topic", keyword)
        })
        .collect()
}

/// A recovery routine the agent keeps repeating is automation fodder.
pub fn self_improvement(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .recovery_patterns
        .iter()
        .filter(|p| p.occurrences_last_week >= 5)
        .map(|p| {
            Signal::new(
                types::SELF_IMPROVEMENT,
                Urgency::Low,
                format!(
                    "recovery pattern \"{}\" ran {} times this week",
                    p.pattern, p.occurrences_last_week
                ),
            )
            .with("topic", p.pattern.clone())
        })
        .collect()
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
