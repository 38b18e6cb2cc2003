use super::*;
use tempfile::tempdir;

fn store_in(dir: &tempfile::TempDir) -> GoalStore {
    GoalStore::open(dir.path().join("goals.json")).unwrap()
}

fn opts(id: &str) -> AddGoalOptions {
    AddGoalOptions {
        id: Some(id.to_string()),
        ..Default::default()
    }
}

#[test]
fn add_and_get() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    let goal = store.add("Ship A", opts("g1"), 100).unwrap();
    assert_eq!(goal.status, GoalStatus::Active);
    assert_eq!(store.get("g1").unwrap().title, "Ship A");
}

#[test]
fn goals_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = store_in(&dir);
        store.add("Ship A", opts("g1"), 100).unwrap();
    }
    let store = store_in(&dir);
    assert!(store.get("g1").is_some());
}

#[test]
fn update_rejects_illegal_transition() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    store.add("Ship A", opts("g1"), 100).unwrap();

    // active -> completed is not in the graph
    let result = store
        .update(
            "g1",
            GoalUpdateFields {
                status: Some(GoalStatus::Completed),
                ..Default::default()
            },
            200,
        )
        .unwrap();
    assert!(result.is_none());
    // Goal unchanged
    let goal = store.get("g1").unwrap();
    assert_eq!(goal.status, GoalStatus::Active);
    assert_eq!(goal.updated_at, 100);
}

#[test]
fn update_applies_legal_transition_and_log() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    store.add("Ship A", opts("g1"), 100).unwrap();

    let goal = store
        .update(
            "g1",
            GoalUpdateFields {
                status: Some(GoalStatus::InProgress),
                progress: Some(30),
                note: Some("started".into()),
                ..Default::default()
            },
            200,
        )
        .unwrap()
        .unwrap();
    assert_eq!(goal.status, GoalStatus::InProgress);
    assert_eq!(goal.progress, 30);
    assert_eq!(goal.updated_at, 200);
    assert!(goal.log.iter().any(|e| e.event == "status"));
}

#[test]
fn milestone_completion_auto_completes_goal() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    let mut options = opts("g1");
    options.milestones = vec!["one".into(), "two".into()];
    store.add("Ship A", options, 100).unwrap();
    store
        .update(
            "g1",
            GoalUpdateFields {
                status: Some(GoalStatus::InProgress),
                ..Default::default()
            },
            150,
        )
        .unwrap();

    let first = store
        .complete_milestone("g1", "m1", "tests pass", "sonnet", 200)
        .unwrap()
        .unwrap();
    assert!(!first.goal_completed);

    let second = store
        .complete_milestone("g1", "m2", "shipped", "sonnet", 300)
        .unwrap()
        .unwrap();
    assert!(second.goal_completed);
    assert_eq!(second.goal.status, GoalStatus::Completed);
    assert_eq!(second.goal.progress, 100);
}

#[test]
fn milestone_completion_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    let mut options = opts("g1");
    options.milestones = vec!["one".into(), "two".into()];
    store.add("Ship A", options, 100).unwrap();

    store
        .complete_milestone("g1", "m1", "done", "sonnet", 200)
        .unwrap();
    let again = store
        .complete_milestone("g1", "m1", "done", "sonnet", 300)
        .unwrap()
        .unwrap();
    assert!(!again.goal_completed);
}

#[test]
fn unknown_goal_or_milestone_is_none() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    store.add("Ship A", opts("g1"), 100).unwrap();
    assert!(store
        .complete_milestone("nope", "m1", "", "m", 1)
        .unwrap()
        .is_none());
    assert!(store
        .complete_milestone("g1", "nope", "", "m", 1)
        .unwrap()
        .is_none());
}

#[test]
fn propose_creates_proposed_agent_goal() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    let mut options = opts("g1");
    options.source = GoalSource::Agent;
    let goal = store.propose("Learn X", options, 100).unwrap();
    assert_eq!(goal.status, GoalStatus::Proposed);
    assert_eq!(goal.source, GoalSource::Agent);
    // Proposed goals do not count toward the live agent-goal cap
    assert_eq!(store.count_agent_active(), 1);
}

#[test]
fn fuzzy_title_match() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    store.add("Ship project Alpha", opts("g1"), 100).unwrap();

    assert_eq!(
        store.find_by_title("ship project alpha").map(|g| g.id),
        Some("g1".into())
    );
    assert_eq!(
        store.find_by_title("project alpha").map(|g| g.id),
        Some("g1".into()),
        "substring match"
    );
    assert!(store.find_by_title("unrelated").is_none());
}

#[test]
fn stale_goals_by_age() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    let hour = 3_600_000u64;
    store.add("Old", opts("g1"), 0).unwrap();
    store.add("Fresh", opts("g2"), 49 * hour).unwrap();

    let stale = store.stale_goals(48, 50 * hour);
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, "g1");
}

#[test]
fn upcoming_deadlines_window() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);
    let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

    let mut soon = opts("g1");
    soon.deadline = Some(today + chrono::Days::new(1));
    store.add("Soon", soon, 0).unwrap();

    let mut far = opts("g2");
    far.deadline = Some(today + chrono::Days::new(30));
    store.add("Far", far, 0).unwrap();

    let mut past = opts("g3");
    past.deadline = Some(today - chrono::Days::new(1));
    store.add("Past", past, 0).unwrap();

    let upcoming = store.upcoming_deadlines(2, today);
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, "g1");
}

#[test]
fn import_changes_picks_up_external_edit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("goals.json");
    let store = GoalStore::open(&path).unwrap();
    store.add("Ship A", opts("g1"), 100).unwrap();

    assert!(!store.import_changes().unwrap(), "no edit, no reload");

    // Simulate the model editing the file directly
    let mut on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    on_disk["goals"][0]["title"] = serde_json::Value::from("Ship A (renamed)");
    std::fs::write(&path, serde_json::to_vec_pretty(&on_disk).unwrap()).unwrap();
    // Push the mtime forward past filesystem timestamp granularity
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(2);
    let file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.set_times(std::fs::FileTimes::new().set_modified(later))
        .unwrap();

    assert!(store.import_changes().unwrap());
    assert_eq!(store.get("g1").unwrap().title, "Ship A (renamed)");
}
