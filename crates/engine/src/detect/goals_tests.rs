use super::*;
use minder_core::test_support::GoalBuilder;
use minder_core::Priority;

const HOUR: u64 = 3_600_000;

fn world_with(goals: Vec<minder_core::Goal>, now: u64) -> WorldSnapshot {
    WorldSnapshot {
        now_ms: now,
        goals,
        ..Default::default()
    }
}

#[test]
fn stale_goal_thresholds() {
    let now = 200 * HOUR;
    let world = world_with(
        vec![
            GoalBuilder::new("g1", "Fresh")
                .status(GoalStatus::InProgress)
                .updated_at(now - 47 * HOUR)
                .build(),
            GoalBuilder::new("g2", "Stale")
                .status(GoalStatus::InProgress)
                .updated_at(now - 50 * HOUR)
                .build(),
            GoalBuilder::new("g3", "Very stale")
                .status(GoalStatus::InProgress)
                .updated_at(now - 97 * HOUR)
                .build(),
            GoalBuilder::new("g4", "Active not in progress")
                .status(GoalStatus::Active)
                .updated_at(0)
                .build(),
        ],
        now,
    );
    let mut state = CycleState::default();
    let signals = stale_goals(&world, &mut state);
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].urgency, Urgency::Medium);
    assert_eq!(signals[0].goal_id(), Some("g2"));
    assert_eq!(signals[1].urgency, Urgency::High);
}

#[test]
fn blocked_goal_nudges_after_two_weeks() {
    let now = 1_000 * HOUR;
    let day = 24 * HOUR;
    let world = world_with(
        vec![
            GoalBuilder::new("g1", "Recently blocked")
                .status(GoalStatus::Blocked)
                .updated_at(now - 2 * day)
                .build(),
            GoalBuilder::new("g2", "Blocked a while")
                .status(GoalStatus::Blocked)
                .updated_at(now - 4 * day)
                .build(),
            GoalBuilder::new("g3", "Blocked too long")
                .status(GoalStatus::Blocked)
                .updated_at(now - 15 * day)
                .build(),
        ],
        now,
    );
    let mut state = CycleState::default();
    let signals = blocked_goals(&world, &mut state);
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].urgency, Urgency::Medium);
    assert!(!signals[0].data.contains_key("nudge_user"));
    assert_eq!(signals[1].urgency, Urgency::High);
    assert_eq!(signals[1].data["nudge_user"], true);
}

#[test]
fn deadline_urgency_by_days_left() {
    let today = chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
    let mut world = world_with(
        vec![
            GoalBuilder::new("g1", "Due today")
                .status(GoalStatus::Active)
                .deadline(today)
                .build(),
            GoalBuilder::new("g2", "Due in two days")
                .status(GoalStatus::InProgress)
                .deadline(today + chrono::Days::new(2))
                .build(),
            GoalBuilder::new("g3", "Far out")
                .status(GoalStatus::Active)
                .deadline(today + chrono::Days::new(10))
                .build(),
            GoalBuilder::new("g4", "Blocked, ignored")
                .status(GoalStatus::Blocked)
                .deadline(today)
                .build(),
        ],
        0,
    );
    world.today = today;
    let mut state = CycleState::default();
    let signals = approaching_deadlines(&world, &mut state);
    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].urgency, Urgency::High);
    assert_eq!(signals[1].urgency, Urgency::Medium);
}

#[test]
fn goal_work_takes_top_three_by_priority() {
    let goals = vec![
        GoalBuilder::new("g1", "Low")
            .status(GoalStatus::Active)
            .priority(Priority::Low)
            .milestone("m1", "a")
            .build(),
        GoalBuilder::new("g2", "Critical")
            .status(GoalStatus::InProgress)
            .priority(Priority::Critical)
            .milestone("m1", "b")
            .build(),
        GoalBuilder::new("g3", "High")
            .status(GoalStatus::Active)
            .priority(Priority::High)
            .milestone("m1", "c")
            .build(),
        GoalBuilder::new("g4", "Medium")
            .status(GoalStatus::Active)
            .priority(Priority::Medium)
            .milestone("m1", "d")
            .build(),
        GoalBuilder::new("g5", "No milestones")
            .status(GoalStatus::Active)
            .priority(Priority::Critical)
            .build(),
    ];
    let world = world_with(goals, 0);
    let mut state = CycleState::default();
    let signals = goal_work(&world, &mut state);
    assert_eq!(signals.len(), 3);
    assert_eq!(signals[0].goal_id(), Some("g2"));
    assert_eq!(signals[0].urgency, Urgency::Critical);
    assert_eq!(signals[1].goal_id(), Some("g3"));
    assert_eq!(signals[2].goal_id(), Some("g4"));
    assert_eq!(signals[2].urgency, Urgency::Medium);
}
