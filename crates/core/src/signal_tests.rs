use super::*;
use yare::parameterized;

#[parameterized(
    low = { Urgency::Low, 3 * 3600 },
    medium = { Urgency::Medium, 3600 },
    high = { Urgency::High, 0 },
    critical = { Urgency::Critical, 0 },
)]
fn cooldown_windows(urgency: Urgency, secs: u64) {
    assert_eq!(urgency.cooldown(), Duration::from_secs(secs));
}

#[test]
fn urgency_orders_low_to_critical() {
    assert!(Urgency::Low < Urgency::Medium);
    assert!(Urgency::Medium < Urgency::High);
    assert!(Urgency::High < Urgency::Critical);
}

#[test]
fn step_up_saturates_at_critical() {
    assert_eq!(Urgency::Low.step_up(), Urgency::Medium);
    assert_eq!(Urgency::High.step_up(), Urgency::Critical);
    assert_eq!(Urgency::Critical.step_up(), Urgency::Critical);
}

#[test]
fn key_prefers_goal_id() {
    let signal = Signal::new(types::STALE_GOAL, Urgency::Medium, "Ship A is stale")
        .with("goal_id", "g1")
        .with("topic", "ignored");
    assert_eq!(signal.key(), "stale_goal:g1");
}

#[test]
fn key_falls_back_to_topic() {
    let signal =
        Signal::new(types::FOLLOWUP, Urgency::Medium, "finish m2").with("topic", "finish m2");
    assert_eq!(signal.key(), "followup:finish m2");
}

#[test]
fn key_without_data_is_bare_type() {
    let a = Signal::new(types::CONVERSATION_GAP, Urgency::Low, "quiet for 19h");
    let b = Signal::new(types::CONVERSATION_GAP, Urgency::Low, "quiet for 20h");
    assert_eq!(a.key(), "conversation_gap");
    assert_eq!(a.key(), b.key(), "repeated emissions share one cooldown");
}

#[test]
fn key_stringifies_non_string_values() {
    let signal = Signal::new(types::FAILING_CRON, Urgency::Medium, "cron").with("cron_id", 7);
    assert_eq!(signal.key(), "failing_cron:7");
}
