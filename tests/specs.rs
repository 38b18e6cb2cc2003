//! Workspace-level scenario tests: a full supervisor against fake
//! adapters with a frozen clock.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use minder_adapters::{
    BackendKind, ErrorAnalytics, FakeAutoCoder, FakeBackend, FakeMessaging, FakeNotify,
    FakeSession, FakeToolBridge, MemoryErrorAnalytics, MessageCategory, ReasoningSession,
};
use minder_core::cycle::DailyCost;
use minder_core::{Clock, CycleState, FakeClock, GoalStatus, CYCLE_STATE_KEY};
use minder_engine::{
    AgentModule, Config, CycleKind, Dispatcher, HattrickModule, MemoryLearningStore,
    NoChainRunner, PermissiveTrust, Router, StaticGate, Supervisor, SupervisorDeps,
    StaticWorldProvider, TransferWatch,
};
use minder_storage::{AddGoalOptions, DiffStore, GoalStore, GoalUpdateFields, KvStore};
use std::sync::Arc;
use tempfile::TempDir;

const HOUR: u64 = 3_600_000;
/// 2026-02-24 12:00:00 UTC - midday, outside default quiet hours.
const NOON: u64 = 1_771_934_400_000;

struct Harness {
    supervisor: Supervisor<FakeClock>,
    clock: FakeClock,
    kv: Arc<KvStore>,
    goals: Arc<GoalStore>,
    session: FakeSession,
    backend: FakeBackend,
    messaging: FakeMessaging,
    notify: FakeNotify,
    analytics: MemoryErrorAnalytics,
    _dir: TempDir,
}

fn harness(modules: Vec<Box<dyn AgentModule>>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(KvStore::open(dir.path().join("state")).unwrap());
    let goals = Arc::new(GoalStore::open(dir.path().join("goals.json")).unwrap());
    let diffs = Arc::new(DiffStore::open(dir.path().join("cycle-diffs")).unwrap());
    let session = FakeSession::new();
    let backend = FakeBackend::new("ollama", BackendKind::Local);
    let messaging = FakeMessaging::new();
    let notify = FakeNotify::new();
    let autocoder = FakeAutoCoder::new();
    let analytics = MemoryErrorAnalytics::new();
    let clock = FakeClock::new();
    clock.set_epoch_ms(NOON);

    let config = Config::default();
    let router = Router::new(
        vec![Arc::new(backend.clone())],
        Arc::new(session.clone()),
        Arc::new(FakeToolBridge::new()),
    );
    let dispatcher = Dispatcher::new(
        Arc::clone(&goals),
        Arc::new(messaging.clone()),
        Arc::new(notify.clone()),
        Arc::new(FakeToolBridge::new()),
        Arc::new(autocoder.clone()),
        Arc::new(StaticGate { score: 10 }),
        Arc::new(PermissiveTrust),
        Arc::new(MemoryLearningStore::new()),
        Arc::new(NoChainRunner),
        config.confidence_gate_enabled,
        config.confidence_gate_min_score,
        config.max_followups,
    );
    let deps = SupervisorDeps {
        kv: Arc::clone(&kv),
        goals: Arc::clone(&goals),
        diffs,
        router,
        dispatcher,
        analytics: Arc::new(analytics.clone()),
        notify: Arc::new(notify.clone()),
        autocoder: Arc::new(autocoder),
        world_provider: Arc::new(StaticWorldProvider::default()),
        modules,
    };
    Harness {
        supervisor: Supervisor::new(config, clock.clone(), deps),
        clock,
        kv,
        goals,
        session,
        backend,
        messaging,
        notify,
        analytics,
        _dir: dir,
    }
}

fn seed_state(h: &Harness, state: &CycleState) {
    h.kv.put(CYCLE_STATE_KEY, state).unwrap();
}

fn load_state(h: &Harness) -> CycleState {
    h.kv.get_as(CYCLE_STATE_KEY).unwrap().unwrap()
}

fn add_in_progress_goal(h: &Harness, id: &str, title: &str, updated_at: u64) {
    h.goals
        .add(
            title,
            AddGoalOptions {
                id: Some(id.to_string()),
                priority: minder_core::Priority::High,
                ..Default::default()
            },
            updated_at,
        )
        .unwrap();
    h.goals
        .update(
            id,
            GoalUpdateFields {
                status: Some(GoalStatus::InProgress),
                ..Default::default()
            },
            updated_at,
        )
        .unwrap();
}

/// Scenario 1: a stale goal and a followup on the same goal are both
/// picked, and only their cooldowns are stamped.
#[tokio::test]
async fn stale_goal_and_followup_on_same_goal() {
    let h = harness(Vec::new());
    let now = h.clock.epoch_ms();
    add_in_progress_goal(&h, "g1", "Ship A", now - 50 * HOUR);

    let mut state = CycleState::default();
    state.cycle_count = 1;
    state.pending_followups.push(minder_core::Followup {
        topic: "finish Ship A milestone m2".into(),
        created_at: now - 2 * HOUR,
        goal_id: Some("g1".into()),
    });
    seed_state(&h, &state);
    h.backend.push_reply("nothing for now");

    let outcome = h.supervisor.run_cycle().await.unwrap();
    assert_eq!(outcome.kind, CycleKind::Reasoning);
    assert_eq!(outcome.picked, 2);

    let state = load_state(&h);
    assert_eq!(state.signal_cooldowns["stale_goal:g1"], now);
    assert_eq!(state.signal_cooldowns["followup:g1"], now);
    let signals_event = state
        .recent_events
        .iter()
        .find(|e| e.event == "agent:cycle:signals")
        .unwrap();
    assert_eq!(signals_event.data["count"], 2);
}

/// Scenario 2: an error spike past the alert cooldown fires exactly one
/// direct alert and restamps the cooldown.
#[tokio::test]
async fn error_spike_with_alert_cooldown() {
    let h = harness(Vec::new());
    let now = h.clock.epoch_ms();
    for i in 0..12 {
        h.analytics
            .record_error("scraper", &format!("recent {i}"), now - 30 * 60_000);
    }
    for i in 0..4 {
        h.analytics
            .record_error("scraper", &format!("prior {i}"), now - 90 * 60_000);
    }
    let mut state = CycleState::default();
    state.cycle_count = 1;
    state.last_error_spike_alert_at = now - 2 * HOUR;
    seed_state(&h, &state);
    h.session.push_reply("investigating");

    let outcome = h.supervisor.run_cycle().await.unwrap();
    assert_eq!(outcome.picked, 1);
    assert_eq!(h.notify.alerts().len(), 1);
    assert_eq!(h.notify.alerts()[0].0, "error_spike");
    assert_eq!(load_state(&h).last_error_spike_alert_at, now);
}

/// Scenario 3: a cost spike imposes a sonnet cooldown, and the next
/// qualifying high-urgency signal runs on a free backend.
#[tokio::test]
async fn cost_spike_imposes_sonnet_cooldown() {
    let h = harness(Vec::new());
    let now = h.clock.epoch_ms();
    let mut state = CycleState::default();
    state.cycle_count = 40;
    state.daily_cost = 0.45;
    state.daily_cost_date = "2026-02-24".into();
    state.daily_cost_history.push(DailyCost {
        date: "2026-02-23".into(),
        cost_usd: 0.10,
    });
    seed_state(&h, &state);
    h.session.push_reply("spend noted");

    h.supervisor.run_cycle().await.unwrap();
    let state = load_state(&h);
    // ceil(0.46/0.10) = 5 doubled and clamped to [2, 12]
    assert_eq!(state.sonnet_cooldown_until, 50);
    assert!(state.sonnet_cooldown_until > state.cycle_count);
    let paid_calls = h.session.calls().len();

    // Second cycle: a fresh high-urgency spike must run free
    h.clock.advance(std::time::Duration::from_secs(7 * 3600));
    let later = h.clock.epoch_ms();
    for i in 0..12 {
        h.analytics
            .record_error("scraper", &format!("boom {i}"), later - 60_000);
    }
    h.backend.push_reply("handled on the free tier");
    let outcome = h.supervisor.run_cycle().await.unwrap();
    assert!(outcome.invoked_backend);
    assert_eq!(h.session.calls().len(), paid_calls, "paid tier untouched");
    assert!(!h.backend.calls().is_empty());
}

/// Scenario 4: a reflection cycle permits at most one mutating
/// directive and leaves the persistent session untouched.
#[tokio::test]
async fn reflection_cycle_with_zero_signals() {
    let h = harness(Vec::new());
    let mut state = CycleState::default();
    state.cycle_count = 8;
    seed_state(&h, &state);
    h.backend.push_reply(
        "<goal_propose title=\"Learn sourdough\" rationale=\"mentioned twice\">- starter</goal_propose>\
         <goal_create title=\"Extra goal\">should be dropped</goal_create>",
    );

    let outcome = h.supervisor.run_cycle().await.unwrap();
    assert_eq!(outcome.kind, CycleKind::Reflection);

    let goals = h.goals.list(&Default::default());
    assert_eq!(goals.len(), 1, "second mutating directive dropped");
    assert_eq!(goals[0].status, GoalStatus::Proposed);
    assert_eq!(h.session.accumulated_tokens(), 0, "session token-neutral");
    assert!(h.session.calls().is_empty());
}

/// Scenario 5: a critical module signal overrides quiet hours and keeps
/// the default cadence.
#[tokio::test]
async fn quiet_hours_override_for_critical_transfer() {
    let now_quiet = NOON + 11 * HOUR + 30 * 60_000; // 23:30 UTC
    let modules: Vec<Box<dyn AgentModule>> = vec![Box::new(HattrickModule::new(vec![
        TransferWatch {
            player: "Kovacs".into(),
            deadline_at: now_quiet + 20 * 60_000,
            max_bid: 500_000,
        },
    ]))];
    let h = harness(modules);
    h.clock.set_epoch_ms(now_quiet);
    let mut state = CycleState::default();
    state.cycle_count = 1;
    seed_state(&h, &state);
    h.session
        .push_reply("<wa_message>Kovacs closes in 20m, bid 450k now.</wa_message>");

    let outcome = h.supervisor.run_cycle().await.unwrap();
    let sent = h.messaging.sent();
    assert_eq!(sent.len(), 1, "critical module signal beats quiet hours");
    assert_eq!(sent[0].0, MessageCategory::Hattrick);
    assert_eq!(
        outcome.next_delay,
        h.supervisor.config().loop_interval,
        "default cadence, not the quiet-hours stretch"
    );
}

/// Scenario 6: the spec's canonical malformed tool call parses through
/// lenient repair without raising.
#[test]
fn parser_repairs_malformed_tool_call() {
    let outcome = minder_engine::parse("<tool_call name=\"t\">{\"a\":\"b\"}\"</tool_call>");
    assert_eq!(outcome.directives.len(), 1);
    match &outcome.directives[0] {
        minder_core::Directive::ToolCall { name, params } => {
            assert_eq!(name, "t");
            assert_eq!(
                params.as_json().unwrap(),
                &serde_json::json!({"a": "b"})
            );
        }
        other => panic!("unexpected directive {other:?}"),
    }
}

/// Two consecutive cycles over unchanged state: the second is filtered
/// down to a skip and mutates nothing.
#[tokio::test]
async fn unchanged_state_converges_to_skip() {
    let h = harness(Vec::new());
    let now = h.clock.epoch_ms();
    add_in_progress_goal(&h, "g1", "Ship A", now - 50 * HOUR);
    let mut state = CycleState::default();
    state.cycle_count = 1;
    seed_state(&h, &state);
    h.backend.push_reply("looked at it");

    let first = h.supervisor.run_cycle().await.unwrap();
    assert_eq!(first.kind, CycleKind::Reasoning);
    let goals_before = h.goals.list(&Default::default());

    // A minute later nothing has changed; the stale-goal cooldown
    // filters the only signal and the cycle skips
    h.clock.advance(std::time::Duration::from_secs(60));
    let second = h.supervisor.run_cycle().await.unwrap();
    assert_eq!(second.kind, CycleKind::Skip);
    assert!(!second.invoked_backend);
    assert_eq!(h.goals.list(&Default::default()), goals_before);
}
