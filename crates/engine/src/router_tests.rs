use super::*;
use minder_adapters::{FakeBackend, FakeSession, FakeToolBridge, ToolResult};
use minder_core::Signal;

fn signal(signal_type: &str, urgency: Urgency, summary: &str) -> Signal {
    Signal::new(signal_type, urgency, summary)
}

fn router(
    backends: Vec<Arc<dyn LlmBackend>>,
    session: FakeSession,
    tools: FakeToolBridge,
) -> Router {
    Router::new(backends, Arc::new(session), Arc::new(tools))
}

#[test]
fn high_urgency_goes_paid() {
    let picked = vec![signal("error_spike", Urgency::High, "12 errors")];
    assert_eq!(choose_tier(&picked, &CycleState::default()), Tier::Paid);
}

#[test]
fn code_keywords_go_paid() {
    let picked = vec![signal(
        "followup",
        Urgency::Medium,
        "fix the flaky scraper test",
    )];
    assert_eq!(choose_tier(&picked, &CycleState::default()), Tier::Paid);
}

#[test]
fn routine_work_stays_free() {
    let picked = vec![signal("stale_memory", Urgency::Low, "memory untouched")];
    assert_eq!(choose_tier(&picked, &CycleState::default()), Tier::Free);
}

#[test]
fn sonnet_cooldown_downgrades_qualifying_signals() {
    let picked = vec![signal("error_spike", Urgency::High, "12 errors")];
    let mut state = CycleState::default();
    state.cycle_count = 5;
    state.sonnet_cooldown_until = 9;
    assert_eq!(choose_tier(&picked, &state), Tier::Free);
}

#[tokio::test]
async fn paid_invocation_uses_session() {
    let session = FakeSession::new();
    session.push_reply("<action_taken>checked goals</action_taken>");
    let r = router(vec![], session.clone(), FakeToolBridge::new());

    let invocation = r
        .invoke("prompt", Tier::Paid, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(invocation.used_paid);
    assert_eq!(session.calls().len(), 1);
    assert!(invocation.text.contains("checked goals"));
}

#[tokio::test]
async fn free_prefers_local_backend() {
    let local = FakeBackend::new("ollama", BackendKind::Local);
    local.push_reply("local reply");
    let hosted = FakeBackend::new("groq", BackendKind::HostedFree);
    hosted.push_reply("hosted reply");

    let r = router(
        vec![Arc::new(hosted.clone()), Arc::new(local.clone())],
        FakeSession::new(),
        FakeToolBridge::new(),
    );
    let invocation = r
        .invoke("prompt", Tier::Free, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(invocation.backend_name, "ollama");
    assert!(!invocation.used_paid);
}

#[tokio::test]
async fn unhealthy_local_falls_through_to_hosted() {
    let local = FakeBackend::new("ollama", BackendKind::Local);
    local.set_healthy(false);
    let hosted = FakeBackend::new("groq", BackendKind::HostedFree);
    hosted.push_reply("hosted reply");

    let r = router(
        vec![Arc::new(local), Arc::new(hosted)],
        FakeSession::new(),
        FakeToolBridge::new(),
    );
    let invocation = r
        .invoke("prompt", Tier::Free, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(invocation.backend_name, "groq");
}

#[tokio::test]
async fn failing_free_backend_falls_back_to_paid() {
    let local = FakeBackend::new("ollama", BackendKind::Local);
    local.fail_next();
    let session = FakeSession::new();
    session.push_reply("paid fallback reply");

    let r = router(vec![Arc::new(local)], session.clone(), FakeToolBridge::new());
    let invocation = r
        .invoke("prompt", Tier::Free, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(invocation.used_paid);
    assert!(invocation.text.contains("paid fallback"));
}

#[tokio::test]
async fn no_backends_at_all_uses_paid() {
    let session = FakeSession::new();
    session.push_reply("paid reply");
    let r = router(vec![], session, FakeToolBridge::new());
    let invocation = r
        .invoke("prompt", Tier::Free, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(invocation.used_paid);
}

#[tokio::test]
async fn tool_loop_executes_and_feeds_results_back() {
    let session = FakeSession::new();
    session.push_reply("<tool_call name=\"read_file\">{\"path\":\"a\"}</tool_call>");
    session.push_reply("<action_taken>read the file</action_taken>");
    let tools = FakeToolBridge::new();
    tools.script("read_file", ToolResult::ok("contents of a"));

    let r = router(vec![], session.clone(), tools.clone());
    let invocation = r
        .invoke("prompt", Tier::Paid, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(invocation.tool_log.len(), 1);
    assert!(invocation.tool_log[0].success);
    let calls = session.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].contains("<tool_result name=\"read_file\">contents of a</tool_result>"));
    assert!(invocation.text.contains("read the file"));
}

#[tokio::test]
async fn tool_failure_returns_error_to_model() {
    let session = FakeSession::new();
    session.push_reply("<tool_call name=\"shell\">{\"cmd\":\"ls\"}</tool_call>");
    session.push_reply("done");
    let tools = FakeToolBridge::new();
    tools.script("shell", ToolResult::error("permission denied"));

    let r = router(vec![], session.clone(), tools);
    r.invoke("prompt", Tier::Paid, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(session.calls()[1].contains("Error: permission denied"));
}

#[tokio::test]
async fn tool_loop_is_bounded() {
    let session = FakeSession::new();
    // Scripted to always ask for another tool call
    for _ in 0..10 {
        session.push_reply("<tool_call name=\"t\">{}</tool_call>");
    }
    let r = router(vec![], session.clone(), FakeToolBridge::new());
    let invocation = r
        .invoke("prompt", Tier::Paid, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(invocation.tool_log.len(), 5, "capped at five rounds");
    assert_eq!(session.calls().len(), 5);
}

#[test]
fn session_reset_policy() {
    let session = FakeSession::new();
    let r = router(vec![], session.clone(), FakeToolBridge::new());

    assert!(!r.maybe_reset_session(false));

    session.set_tokens(MAX_SESSION_TOKENS + 1);
    assert!(r.maybe_reset_session(false));
    assert_eq!(session.reset_count(), 1);

    for _ in 0..MAX_SESSION_CYCLES {
        session.note_cycle();
    }
    assert!(r.maybe_reset_session(false));

    assert!(r.maybe_reset_session(true), "prior error forces reset");
}
