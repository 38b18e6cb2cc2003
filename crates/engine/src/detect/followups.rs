//! Followup detector: re-surface deferred work with age-based urgency.

use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, Goal, Signal};

/// Resolve a followup's goal: stored id first, then fuzzy title match
/// of the topic against goal titles.
fn resolve_goal<'w>(world: &'w WorldSnapshot, topic: &str, goal_id: Option<&str>) -> Option<&'w Goal> {
    if let Some(id) = goal_id {
        if let Some(goal) = world.goals.iter().find(|g| g.id == *id) {
            return Some(goal);
        }
    }
    let needle = topic.to_lowercase();
    world.goals.iter().find(|g| {
        let title = g.title.to_lowercase();
        needle.contains(&title) || title.contains(&needle)
    })
}

/// One signal per pending followup.
pub fn followups(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .followups
        .iter()
        .map(|followup| {
            let goal = resolve_goal(
                world,
                &followup.topic,
                followup.goal_id.as_ref().map(|id| id.as_str()),
            );
            let urgency = followup.urgency(goal.map(|g| g.priority), world.now_ms);
            let mut signal = Signal::new(
                types::FOLLOWUP,
                urgency,
                format!("followup: {}", followup.topic),
            )
            .with("topic", followup.topic.clone());
            if let Some(goal) = goal {
                signal = signal.with("goal_id", goal.id.as_str());
            }
            signal
        })
        .collect()
}

#[cfg(test)]
#[path = "followups_tests.rs"]
mod tests;
