//! Stuck-workflow detector.

use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, Signal, Urgency};

const STEP_STUCK_MS: u64 = 2 * 3_600_000;

/// A running workflow whose current step has not moved in two hours, or
/// whose total lifetime exceeded its allowance.
pub fn plan_stuck(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .workflows
        .iter()
        .filter_map(|wf| {
            let step_age = world.now_ms.saturating_sub(wf.current_step_started_at);
            let lifetime = world.now_ms.saturating_sub(wf.started_at);
            let reason = if step_age > STEP_STUCK_MS {
                format!(
                    "step running for {}",
                    minder_core::format_elapsed_ms(step_age)
                )
            } else if wf.max_duration_ms > 0 && lifetime > wf.max_duration_ms {
                format!(
                    "lifetime {} past its allowance",
                    minder_core::format_elapsed_ms(lifetime)
                )
            } else {
                return None;
            };
            Some(
                Signal::new(
                    types::PLAN_STUCK,
                    Urgency::Medium,
                    format!("workflow \"{}\": {reason}", wf.name),
                )
                .with("topic", wf.id.clone()),
            )
        })
        .collect()
}

#[cfg(test)]
#[path = "workflows_tests.rs"]
mod tests;
