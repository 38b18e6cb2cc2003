//! Goal-shaped detectors: staleness, blockage, deadlines, and
//! milestone work.

use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, GoalStatus, Signal, Urgency};

const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 24 * HOUR_MS;

/// `in_progress` goals untouched for 48 h; 96 h escalates.
pub fn stale_goals(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .goals
        .iter()
        .filter(|g| g.status == GoalStatus::InProgress)
        .filter_map(|g| {
            let age_ms = world.now_ms.saturating_sub(g.updated_at);
            if age_ms < 48 * HOUR_MS {
                return None;
            }
            let urgency = if age_ms > 96 * HOUR_MS {
                Urgency::High
            } else {
                Urgency::Medium
            };
            Some(
                Signal::new(
                    types::STALE_GOAL,
                    urgency,
                    format!(
                        "goal \"{}\" has had no progress for {}",
                        g.title,
                        minder_core::format_elapsed_ms(age_ms)
                    ),
                )
                .with("goal_id", g.id.as_str()),
            )
        })
        .collect()
}

/// `blocked` goals aging toward a user nudge.
pub fn blocked_goals(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .goals
        .iter()
        .filter(|g| g.status == GoalStatus::Blocked)
        .filter_map(|g| {
            let age_ms = world.now_ms.saturating_sub(g.updated_at);
            if age_ms < 3 * DAY_MS {
                return None;
            }
            let urgency = if age_ms >= 7 * DAY_MS {
                Urgency::High
            } else {
                Urgency::Medium
            };
            let mut signal = Signal::new(
                types::BLOCKED_GOAL,
                urgency,
                format!(
                    "goal \"{}\" blocked for {}",
                    g.title,
                    minder_core::format_elapsed_ms(age_ms)
                ),
            )
            .with("goal_id", g.id.as_str());
            if age_ms >= 14 * DAY_MS {
                signal = signal.with("nudge_user", true);
            }
            Some(signal)
        })
        .collect()
}

/// Deadlines within two days (day granularity: due tomorrow or sooner
/// is high, the day after is medium).
pub fn approaching_deadlines(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .goals
        .iter()
        .filter(|g| matches!(g.status, GoalStatus::Active | GoalStatus::InProgress))
        .filter_map(|g| {
            let deadline = g.deadline?;
            let days_left = (deadline - world.today).num_days();
            if !(0..=2).contains(&days_left) {
                return None;
            }
            let urgency = if days_left <= 1 {
                Urgency::High
            } else {
                Urgency::Medium
            };
            Some(
                Signal::new(
                    types::DEADLINE_APPROACHING,
                    urgency,
                    format!("goal \"{}\" is due {}", g.title, deadline),
                )
                .with("goal_id", g.id.as_str())
                .with("deadline", deadline.to_string()),
            )
        })
        .collect()
}

/// Top three workable goals by priority, each with its next milestone.
pub fn goal_work(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    let mut workable: Vec<_> = world
        .goals
        .iter()
        .filter(|g| {
            matches!(g.status, GoalStatus::Active | GoalStatus::InProgress)
                && g.has_pending_milestones()
        })
        .collect();
    workable.sort_by(|a, b| b.priority.cmp(&a.priority));

    workable
        .into_iter()
        .take(3)
        .filter_map(|g| {
            let milestone = g.next_pending_milestone()?;
            Some(
                Signal::new(
                    types::GOAL_WORK,
                    g.priority.urgency(),
                    format!("goal \"{}\" has milestone \"{}\" ready", g.title, milestone.title),
                )
                .with("goal_id", g.id.as_str())
                .with("milestone_id", milestone.id.as_str()),
            )
        })
        .collect()
}

#[cfg(test)]
#[path = "goals_tests.rs"]
mod tests;
