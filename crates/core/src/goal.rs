//! Goals, milestones and the status transition graph

use crate::signal::Urgency;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

crate::define_id! {
    /// Unique identifier for a goal.
    pub struct GoalId;
}

crate::define_id! {
    /// Unique identifier for a milestone within a goal.
    pub struct MilestoneId;
}

/// Maximum entries retained in a goal's append-only log.
pub const GOAL_LOG_CAP: usize = 50;

/// Goal lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Draft,
    Active,
    InProgress,
    Blocked,
    Completed,
    Abandoned,
    /// Agent-suggested, awaiting user approval.
    Proposed,
    Pending,
}

impl GoalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Completed | GoalStatus::Abandoned)
    }

    /// Whether `self → next` is a legal transition.
    ///
    /// `proposed` and `pending` goals enter the graph through `active`
    /// (user approval) or `abandoned` (rejection).
    pub fn can_transition_to(&self, next: GoalStatus) -> bool {
        use GoalStatus::*;
        matches!(
            (self, next),
            (Draft, Active | Abandoned)
                | (Active, InProgress | Blocked | Abandoned)
                | (InProgress, Blocked | Completed | Abandoned)
                | (Blocked, InProgress | Abandoned)
                | (Proposed, Active | Abandoned)
                | (Pending, Active | Abandoned)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            GoalStatus::Draft => "draft",
            GoalStatus::Active => "active",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Blocked => "blocked",
            GoalStatus::Completed => "completed",
            GoalStatus::Abandoned => "abandoned",
            GoalStatus::Proposed => "proposed",
            GoalStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<GoalStatus> {
        Some(match s {
            "draft" => GoalStatus::Draft,
            "active" => GoalStatus::Active,
            "in_progress" => GoalStatus::InProgress,
            "blocked" => GoalStatus::Blocked,
            "completed" => GoalStatus::Completed,
            "abandoned" => GoalStatus::Abandoned,
            "proposed" => GoalStatus::Proposed,
            "pending" => GoalStatus::Pending,
            _ => return None,
        })
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Goal priority. Ordering is `Low < Normal < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Map a priority onto the urgency scale.
    ///
    /// `normal` and `medium` both land on `Medium`; followup aging then
    /// steps down one tier for its baseline.
    pub fn urgency(&self) -> Urgency {
        match self {
            Priority::Critical => Urgency::Critical,
            Priority::High => Urgency::High,
            Priority::Medium | Priority::Normal => Urgency::Medium,
            Priority::Low => Urgency::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Who created the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalSource {
    #[default]
    User,
    Agent,
}

/// Milestone completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    Done,
    Skipped,
}

/// An ordered step toward a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub title: String,
    #[serde(default)]
    pub status: MilestoneStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Milestone {
    pub fn new(id: impl Into<MilestoneId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: MilestoneStatus::Pending,
            completed_at: None,
            evidence: None,
        }
    }
}

/// One entry in a goal's bounded activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalLogEntry {
    pub ts: u64,
    pub event: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// A long-lived objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: GoalStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Percent complete, 0..=100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub linked_topics: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<GoalLogEntry>,
    pub updated_at: u64,
    #[serde(default)]
    pub source: GoalSource,
}

impl Goal {
    pub fn new(id: impl Into<GoalId>, title: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: GoalStatus::Draft,
            priority: Priority::Normal,
            progress: 0,
            deadline: None,
            linked_topics: BTreeSet::new(),
            milestones: Vec::new(),
            log: Vec::new(),
            updated_at: now_ms,
            source: GoalSource::User,
        }
    }

    /// Append to the activity log, dropping the oldest entry past the cap.
    pub fn append_log(&mut self, ts: u64, event: impl Into<String>, note: impl Into<String>) {
        self.log.push(GoalLogEntry {
            ts,
            event: event.into(),
            note: note.into(),
        });
        if self.log.len() > GOAL_LOG_CAP {
            let excess = self.log.len() - GOAL_LOG_CAP;
            self.log.drain(..excess);
        }
    }

    /// True when every non-skipped milestone is done and at least one
    /// milestone was actually completed.
    pub fn all_milestones_done(&self) -> bool {
        let mut any_done = false;
        for ms in &self.milestones {
            match ms.status {
                MilestoneStatus::Done => any_done = true,
                MilestoneStatus::Skipped => {}
                MilestoneStatus::Pending => return false,
            }
        }
        any_done
    }

    /// First pending milestone, in declared order.
    pub fn next_pending_milestone(&self) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|m| m.status == MilestoneStatus::Pending)
    }

    pub fn has_pending_milestones(&self) -> bool {
        self.next_pending_milestone().is_some()
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }
}

#[cfg(test)]
#[path = "goal_tests.rs"]
mod tests;
