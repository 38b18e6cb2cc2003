use super::*;
use yare::parameterized;

#[parameterized(
    draft_to_active = { GoalStatus::Draft, GoalStatus::Active, true },
    draft_to_abandoned = { GoalStatus::Draft, GoalStatus::Abandoned, true },
    draft_to_in_progress = { GoalStatus::Draft, GoalStatus::InProgress, false },
    active_to_in_progress = { GoalStatus::Active, GoalStatus::InProgress, true },
    active_to_blocked = { GoalStatus::Active, GoalStatus::Blocked, true },
    active_to_completed = { GoalStatus::Active, GoalStatus::Completed, false },
    in_progress_to_completed = { GoalStatus::InProgress, GoalStatus::Completed, true },
    in_progress_to_blocked = { GoalStatus::InProgress, GoalStatus::Blocked, true },
    blocked_to_in_progress = { GoalStatus::Blocked, GoalStatus::InProgress, true },
    blocked_to_completed = { GoalStatus::Blocked, GoalStatus::Completed, false },
    completed_is_terminal = { GoalStatus::Completed, GoalStatus::Active, false },
    abandoned_is_terminal = { GoalStatus::Abandoned, GoalStatus::Active, false },
    proposed_to_active = { GoalStatus::Proposed, GoalStatus::Active, true },
    proposed_to_in_progress = { GoalStatus::Proposed, GoalStatus::InProgress, false },
    pending_to_active = { GoalStatus::Pending, GoalStatus::Active, true },
)]
fn transition_graph(from: GoalStatus, to: GoalStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn terminal_statuses() {
    assert!(GoalStatus::Completed.is_terminal());
    assert!(GoalStatus::Abandoned.is_terminal());
    assert!(!GoalStatus::Blocked.is_terminal());
}

#[test]
fn status_labels_round_trip() {
    for status in [
        GoalStatus::Draft,
        GoalStatus::Active,
        GoalStatus::InProgress,
        GoalStatus::Blocked,
        GoalStatus::Completed,
        GoalStatus::Abandoned,
        GoalStatus::Proposed,
        GoalStatus::Pending,
    ] {
        assert_eq!(GoalStatus::parse(status.label()), Some(status));
    }
    assert_eq!(GoalStatus::parse("bogus"), None);
}

#[parameterized(
    critical = { Priority::Critical, crate::signal::Urgency::Critical },
    high = { Priority::High, crate::signal::Urgency::High },
    medium = { Priority::Medium, crate::signal::Urgency::Medium },
    normal = { Priority::Normal, crate::signal::Urgency::Medium },
    low = { Priority::Low, crate::signal::Urgency::Low },
)]
fn priority_maps_to_urgency(priority: Priority, urgency: crate::signal::Urgency) {
    assert_eq!(priority.urgency(), urgency);
}

#[test]
fn goal_log_caps_at_fifty() {
    let mut goal = Goal::new("g1", "Ship A", 0);
    for i in 0..60 {
        goal.append_log(i, "note", format!("entry {i}"));
    }
    assert_eq!(goal.log.len(), GOAL_LOG_CAP);
    assert_eq!(goal.log[0].note, "entry 10", "oldest entries dropped");
}

#[test]
fn milestones_all_done_requires_one_completed() {
    let mut goal = Goal::new("g1", "Ship A", 0);
    assert!(!goal.all_milestones_done(), "no milestones means nothing done");

    goal.milestones.push(Milestone::new("m1", "step one"));
    goal.milestones.push(Milestone::new("m2", "step two"));
    assert!(!goal.all_milestones_done());

    goal.milestones[0].status = MilestoneStatus::Done;
    assert!(!goal.all_milestones_done(), "m2 still pending");

    goal.milestones[1].status = MilestoneStatus::Skipped;
    assert!(goal.all_milestones_done(), "skipped milestones do not block");
}

#[test]
fn all_skipped_is_not_done() {
    let mut goal = Goal::new("g1", "Ship A", 0);
    goal.milestones.push(Milestone::new("m1", "step one"));
    goal.milestones[0].status = MilestoneStatus::Skipped;
    assert!(!goal.all_milestones_done());
}

#[test]
fn next_pending_milestone_is_in_declared_order() {
    let mut goal = Goal::new("g1", "Ship A", 0);
    goal.milestones.push(Milestone::new("m1", "one"));
    goal.milestones.push(Milestone::new("m2", "two"));
    goal.milestones[0].status = MilestoneStatus::Done;
    assert_eq!(goal.next_pending_milestone().map(|m| m.id.as_str()), Some("m2"));
}

#[test]
fn progress_clamps_to_hundred() {
    let mut goal = Goal::new("g1", "Ship A", 0);
    goal.set_progress(250);
    assert_eq!(goal.progress, 100);
}
