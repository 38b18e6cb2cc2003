//! Authoritative goal store backed by `goals.json`.
//!
//! The engine reads freely; all mutations go through this store, which
//! is the sole writer for the goal domain and enforces status-transition
//! legality. The model may also edit the JSON file directly on disk;
//! `import_changes` picks that up by comparing mtimes once per cycle.

use crate::kv::{rotate_corrupt, write_atomic};
use chrono::NaiveDate;
use minder_core::{
    Goal, GoalId, GoalSource, GoalStatus, Milestone, MilestoneId, MilestoneStatus, Priority,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from goal-store operations.
#[derive(Debug, Error)]
pub enum GoalStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk shape of `goals.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GoalsFile {
    #[serde(default)]
    goals: Vec<Goal>,
}

/// Filter for [`GoalStore::list`].
#[derive(Debug, Default, Clone)]
pub struct GoalFilter {
    pub statuses: Option<Vec<GoalStatus>>,
    pub source: Option<GoalSource>,
}

impl GoalFilter {
    pub fn with_statuses(statuses: &[GoalStatus]) -> Self {
        Self {
            statuses: Some(statuses.to_vec()),
            source: None,
        }
    }

    fn matches(&self, goal: &Goal) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&goal.status) {
                return false;
            }
        }
        if let Some(source) = self.source {
            if goal.source != source {
                return false;
            }
        }
        true
    }
}

/// Options for [`GoalStore::add`] and [`GoalStore::propose`].
#[derive(Debug, Default, Clone)]
pub struct AddGoalOptions {
    /// Explicit id, mainly for tests; a v4 UUID otherwise.
    pub id: Option<String>,
    pub description: String,
    pub priority: Priority,
    pub deadline: Option<NaiveDate>,
    pub milestones: Vec<String>,
    pub source: GoalSource,
}

/// Partial update for [`GoalStore::update`].
#[derive(Debug, Default, Clone)]
pub struct GoalUpdateFields {
    pub status: Option<GoalStatus>,
    pub progress: Option<u8>,
    pub note: Option<String>,
    pub priority: Option<Priority>,
    pub deadline: Option<NaiveDate>,
}

/// Result of completing a milestone.
#[derive(Debug, Clone)]
pub struct MilestoneCompletion {
    pub goal: Goal,
    /// True when the completion auto-transitioned the goal to
    /// `completed`.
    pub goal_completed: bool,
}

struct Inner {
    goals: Vec<Goal>,
    loaded_mtime: Option<SystemTime>,
}

/// File-backed goal store.
pub struct GoalStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl GoalStore {
    /// Open the store, loading `goals.json` if present. A corrupt file
    /// is rotated to `.bak` and the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GoalStoreError> {
        let path = path.into();
        let (goals, mtime) = Self::load_file(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                goals,
                loaded_mtime: mtime,
            }),
        })
    }

    fn load_file(path: &Path) -> Result<(Vec<Goal>, Option<SystemTime>), GoalStoreError> {
        if !path.exists() {
            return Ok((Vec::new(), None));
        }
        let bytes = fs::read(path)?;
        let mtime = fs::metadata(path)?.modified().ok();
        match serde_json::from_slice::<GoalsFile>(&bytes) {
            Ok(file) => Ok((file.goals, mtime)),
            Err(_) => {
                rotate_corrupt(path);
                Ok((Vec::new(), None))
            }
        }
    }

    fn persist(&self, goals: &[Goal]) -> Result<Option<SystemTime>, GoalStoreError> {
        let file = GoalsFile {
            goals: goals.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &bytes)?;
        Ok(fs::metadata(&self.path)?.modified().ok())
    }

    /// Current mtime of the on-disk file.
    pub fn json_mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Reload from disk when the file changed under us (the model can
    /// edit `goals.json` directly). Returns whether a reload happened.
    pub fn import_changes(&self) -> Result<bool, GoalStoreError> {
        let disk_mtime = self.json_mtime();
        let mut inner = self.inner.lock();
        if disk_mtime == inner.loaded_mtime {
            return Ok(false);
        }
        let (goals, mtime) = Self::load_file(&self.path)?;
        info!(count = goals.len(), "re-imported goals.json after external edit");
        inner.goals = goals;
        inner.loaded_mtime = mtime;
        Ok(true)
    }

    /// Goals matching the filter, sorted by priority (highest first).
    pub fn list(&self, filter: &GoalFilter) -> Vec<Goal> {
        let inner = self.inner.lock();
        let mut goals: Vec<Goal> = inner
            .goals
            .iter()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect();
        goals.sort_by(|a, b| b.priority.cmp(&a.priority));
        goals
    }

    pub fn get(&self, id: &str) -> Option<Goal> {
        self.inner.lock().goals.iter().find(|g| g.id == *id).cloned()
    }

    /// Case-insensitive fuzzy title lookup: exact match first, then
    /// substring containment either way. Used to resolve followups whose
    /// stored goal id has gone stale.
    pub fn find_by_title(&self, title: &str) -> Option<Goal> {
        let needle = title.to_lowercase();
        let inner = self.inner.lock();
        if let Some(g) = inner
            .goals
            .iter()
            .find(|g| g.title.to_lowercase() == needle)
        {
            return Some(g.clone());
        }
        inner
            .goals
            .iter()
            .find(|g| {
                let hay = g.title.to_lowercase();
                hay.contains(&needle) || needle.contains(&hay)
            })
            .cloned()
    }

    /// Create a goal. New goals start `active`.
    pub fn add(&self, title: &str, opts: AddGoalOptions, now_ms: u64) -> Result<Goal, GoalStoreError> {
        self.insert_goal(title, opts, GoalStatus::Active, now_ms)
    }

    /// Create a user-approval-gated goal in `proposed` status.
    pub fn propose(
        &self,
        title: &str,
        opts: AddGoalOptions,
        now_ms: u64,
    ) -> Result<Goal, GoalStoreError> {
        self.insert_goal(title, opts, GoalStatus::Proposed, now_ms)
    }

    fn insert_goal(
        &self,
        title: &str,
        opts: AddGoalOptions,
        status: GoalStatus,
        now_ms: u64,
    ) -> Result<Goal, GoalStoreError> {
        let id = opts
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut goal = Goal::new(id.as_str(), title, now_ms);
        goal.status = status;
        goal.description = opts.description;
        goal.priority = opts.priority;
        goal.deadline = opts.deadline;
        goal.source = opts.source;
        for (i, ms_title) in opts.milestones.iter().enumerate() {
            goal.milestones
                .push(Milestone::new(format!("m{}", i + 1), ms_title.clone()));
        }
        goal.append_log(now_ms, "created", status.label());

        let mut inner = self.inner.lock();
        inner.goals.push(goal.clone());
        inner.loaded_mtime = self.persist(&inner.goals)?;
        Ok(goal)
    }

    /// Apply a partial update. Returns `None` (goal unchanged) when the
    /// requested status transition is illegal.
    pub fn update(
        &self,
        id: &str,
        fields: GoalUpdateFields,
        now_ms: u64,
    ) -> Result<Option<Goal>, GoalStoreError> {
        let mut inner = self.inner.lock();
        let Some(goal) = inner.goals.iter_mut().find(|g| g.id == *id) else {
            return Ok(None);
        };

        if let Some(next) = fields.status {
            if !goal.status.can_transition_to(next) {
                debug!(
                    goal = %goal.id,
                    from = %goal.status,
                    to = %next,
                    "rejected illegal goal transition"
                );
                return Ok(None);
            }
            let note = format!("{} -> {}", goal.status, next);
            goal.status = next;
            goal.append_log(now_ms, "status", note);
        }
        if let Some(progress) = fields.progress {
            goal.set_progress(progress);
        }
        if let Some(priority) = fields.priority {
            goal.priority = priority;
        }
        if let Some(deadline) = fields.deadline {
            goal.deadline = Some(deadline);
        }
        if let Some(note) = fields.note {
            if !note.is_empty() {
                goal.append_log(now_ms, "note", note);
            }
        }
        goal.updated_at = now_ms;
        let updated = goal.clone();
        inner.loaded_mtime = self.persist(&inner.goals)?;
        Ok(Some(updated))
    }

    /// Mark a milestone done. When every non-skipped milestone is done
    /// the goal auto-transitions to `completed`.
    pub fn complete_milestone(
        &self,
        goal_id: &str,
        milestone_id: &str,
        evidence: &str,
        model: &str,
        now_ms: u64,
    ) -> Result<Option<MilestoneCompletion>, GoalStoreError> {
        let mut inner = self.inner.lock();
        let Some(goal) = inner.goals.iter_mut().find(|g| g.id == *goal_id) else {
            return Ok(None);
        };
        let Some(ms) = goal.milestones.iter_mut().find(|m| m.id == *milestone_id) else {
            return Ok(None);
        };
        if ms.status == MilestoneStatus::Done {
            // Idempotent: re-completing is a no-op report
            return Ok(Some(MilestoneCompletion {
                goal: goal.clone(),
                goal_completed: false,
            }));
        }

        ms.status = MilestoneStatus::Done;
        ms.completed_at = Some(now_ms);
        ms.evidence = Some(evidence.to_string());
        let ms_id = ms.id.clone();
        goal.append_log(
            now_ms,
            "milestone_done",
            format!("{} via {model}", ms_id.as_str()),
        );

        let goal_completed = goal.all_milestones_done() && !goal.status.is_terminal();
        if goal_completed {
            // Auto-completion is a store-internal transition, not an
            // agent effect, so it is not gated by the graph.
            goal.status = GoalStatus::Completed;
            goal.set_progress(100);
            goal.append_log(now_ms, "status", "auto-completed: all milestones done");
        }
        goal.updated_at = now_ms;
        let completed = MilestoneCompletion {
            goal: goal.clone(),
            goal_completed,
        };
        inner.loaded_mtime = self.persist(&inner.goals)?;
        Ok(Some(completed))
    }

    /// Non-terminal goals not updated in the last `hours`.
    pub fn stale_goals(&self, hours: u64, now_ms: u64) -> Vec<Goal> {
        let cutoff_ms = hours * 3600 * 1000;
        self.inner
            .lock()
            .goals
            .iter()
            .filter(|g| {
                !g.status.is_terminal() && now_ms.saturating_sub(g.updated_at) >= cutoff_ms
            })
            .cloned()
            .collect()
    }

    /// Active or in-progress goals with a deadline within `days` of
    /// `today` (inclusive), soonest first.
    pub fn upcoming_deadlines(&self, days: i64, today: NaiveDate) -> Vec<Goal> {
        let mut goals: Vec<Goal> = self
            .inner
            .lock()
            .goals
            .iter()
            .filter(|g| {
                matches!(g.status, GoalStatus::Active | GoalStatus::InProgress)
                    && g.deadline
                        .map(|d| {
                            let delta = (d - today).num_days();
                            (0..=days).contains(&delta)
                        })
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        goals.sort_by_key(|g| g.deadline);
        goals
    }

    /// Number of live agent-created goals, for the creation cap.
    pub fn count_agent_active(&self) -> usize {
        self.inner
            .lock()
            .goals
            .iter()
            .filter(|g| g.source == GoalSource::Agent && !g.status.is_terminal())
            .count()
    }
}

/// Convenience: typed ids for callers that have them.
impl GoalStore {
    pub fn get_by_id(&self, id: &GoalId) -> Option<Goal> {
        self.get(id.as_str())
    }

    pub fn milestone_of<'g>(goal: &'g Goal, id: &MilestoneId) -> Option<&'g Milestone> {
        goal.milestones.iter().find(|m| m.id == *id)
    }
}

#[cfg(test)]
#[path = "goals_tests.rs"]
mod tests;
