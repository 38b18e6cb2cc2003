//! Signal detectors.
//!
//! Each detector is a function over the world snapshot; the collector
//! runs them in a fixed order, appends module detectors, then
//! synthesises compound and chain-opportunity signals. Detector order
//! determines the insertion indices that break selection ties.

mod activity;
mod cost;
mod crons;
mod errors;
mod followups;
mod goals;
mod health;
mod workflows;

pub use activity::{conversation_gap, cycle_anomalies, patterns_observed, self_improvement};
pub use cost::cost_spike;
pub use crons::{failing_crons, low_engagement_crons};
pub use errors::error_spike;
pub use followups::followups;
pub use goals::{approaching_deadlines, blocked_goals, goal_work, stale_goals};
pub use health::{mcp_disconnected, memory_pressure, stale_bot_memory, stale_memories};
pub use workflows::plan_stuck;

use crate::module::AgentModule;
use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, Signal, Urgency};
use std::collections::BTreeMap;
use tracing::debug;

/// A core detector: pure over the world except the narrowly documented
/// state mutations (cost-spike debounce, alert cooldowns).
pub type Detector = fn(&WorldSnapshot, &mut CycleState) -> Vec<Signal>;

/// The core detectors, in their fixed execution order.
pub fn core_detectors() -> Vec<(&'static str, Detector)> {
    vec![
        ("stale_goals", stale_goals as Detector),
        ("blocked_goals", blocked_goals),
        ("approaching_deadlines", approaching_deadlines),
        ("failing_crons", failing_crons),
        ("followups", followups),
        ("cost_spike", cost_spike),
        ("memory_pressure", memory_pressure),
        ("mcp_disconnected", mcp_disconnected),
        ("error_spike", error_spike),
        ("conversation_gap", conversation_gap),
        ("stale_memories", stale_memories),
        ("low_engagement_crons", low_engagement_crons),
        ("stale_bot_memory", stale_bot_memory),
        ("goal_work", goal_work),
        ("cycle_anomalies", cycle_anomalies),
        ("patterns_observed", patterns_observed),
        ("plan_stuck", plan_stuck),
        ("self_improvement", self_improvement),
    ]
}

/// Run every detector (core, then modules, then synthesis) and assign
/// insertion indices.
pub fn collect_signals(
    world: &WorldSnapshot,
    state: &mut CycleState,
    modules: &[Box<dyn AgentModule>],
) -> Vec<Signal> {
    let mut signals = Vec::new();
    for (name, detector) in core_detectors() {
        let found = detector(world, state);
        if !found.is_empty() {
            debug!(detector = name, count = found.len(), "detector fired");
        }
        signals.extend(found);
    }
    for module in modules {
        signals.extend(module.detect(world));
    }
    synthesize(&mut signals);
    for (index, signal) in signals.iter_mut().enumerate() {
        signal.index = index;
    }
    signals
}

/// Compound and chain-opportunity synthesis over the collected set.
fn synthesize(signals: &mut Vec<Signal>) {
    // Compound: three or more low signals accumulated this cycle
    let low_count = signals
        .iter()
        .filter(|s| s.urgency == Urgency::Low)
        .count();
    if low_count >= 3 {
        signals.push(Signal::new(
            types::COMPOUND,
            Urgency::Medium,
            format!("{low_count} low-priority signals accumulated"),
        ));
    }

    // Chain opportunity: several signals about one goal, or a deadline
    // coinciding with ready milestone work
    let mut by_goal: BTreeMap<String, usize> = BTreeMap::new();
    for signal in signals.iter() {
        if let Some(goal_id) = signal.goal_id() {
            *by_goal.entry(goal_id.to_string()).or_default() += 1;
        }
    }
    let clustered = by_goal.iter().find(|(_, count)| **count >= 3);
    let deadline_with_work = signals
        .iter()
        .any(|s| s.signal_type == types::DEADLINE_APPROACHING)
        && signals.iter().any(|s| s.signal_type == types::GOAL_WORK);
    if let Some((goal_id, count)) = clustered {
        signals.push(
            Signal::new(
                types::CHAIN_OPPORTUNITY,
                Urgency::Medium,
                format!("{count} signals converge on one goal"),
            )
            .with("goal_id", goal_id.clone()),
        );
    } else if deadline_with_work {
        signals.push(Signal::new(
            types::CHAIN_OPPORTUNITY,
            Urgency::Medium,
            "a deadline coincides with ready milestone work",
        ));
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
