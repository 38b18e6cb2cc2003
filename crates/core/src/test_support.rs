//! Test builders shared across crates' tests

use crate::goal::{Goal, GoalSource, GoalStatus, Milestone, Priority};
use crate::signal::{Signal, Urgency};

/// Builder for goals in fixtures.
pub struct GoalBuilder {
    goal: Goal,
}

impl GoalBuilder {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            goal: Goal::new(id, title, 0),
        }
    }

    pub fn status(mut self, status: GoalStatus) -> Self {
        self.goal.status = status;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.goal.priority = priority;
        self
    }

    pub fn updated_at(mut self, ms: u64) -> Self {
        self.goal.updated_at = ms;
        self
    }

    pub fn deadline(mut self, date: chrono::NaiveDate) -> Self {
        self.goal.deadline = Some(date);
        self
    }

    pub fn milestone(mut self, id: &str, title: &str) -> Self {
        self.goal.milestones.push(Milestone::new(id, title));
        self
    }

    pub fn source(mut self, source: GoalSource) -> Self {
        self.goal.source = source;
        self
    }

    pub fn build(self) -> Goal {
        self.goal
    }
}

/// Shorthand for a signal with a goal id attached.
pub fn goal_signal(signal_type: &str, urgency: Urgency, goal_id: &str) -> Signal {
    Signal::new(signal_type, urgency, format!("{signal_type} for {goal_id}"))
        .with("goal_id", goal_id)
}
