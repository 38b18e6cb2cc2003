use super::*;
use minder_core::JsonBody;
use serde_json::json;

const MINUTE: u64 = 60_000;

fn module_with(deadline_offset_min: u64, now: u64) -> HattrickModule {
    HattrickModule::new(vec![TransferWatch {
        player: "Kovacs".into(),
        deadline_at: now + deadline_offset_min * MINUTE,
        max_bid: 500_000,
    }])
}

fn world_at(now: u64) -> WorldSnapshot {
    WorldSnapshot {
        now_ms: now,
        ..Default::default()
    }
}

#[test]
fn deadline_within_90_minutes_is_high() {
    let now = 1_000 * MINUTE;
    let signals = module_with(60, now).detect(&world_at(now));
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].urgency, Urgency::High);
    assert_eq!(signals[0].signal_type, types::TRANSFER_DEADLINE);
}

#[test]
fn deadline_within_30_minutes_is_critical() {
    let now = 1_000 * MINUTE;
    let signals = module_with(20, now).detect(&world_at(now));
    assert_eq!(signals[0].urgency, Urgency::Critical);
}

#[test]
fn distant_or_past_deadlines_are_silent() {
    let now = 1_000 * MINUTE;
    assert!(module_with(120, now).detect(&world_at(now)).is_empty());

    let past = HattrickModule::new(vec![TransferWatch {
        player: "Kovacs".into(),
        deadline_at: now - MINUTE,
        max_bid: 1,
    }]);
    assert!(past.detect(&world_at(now)).is_empty());
}

#[test]
fn critical_override_applies_to_owned_signals_only() {
    let now = 1_000 * MINUTE;
    let module = module_with(20, now);
    let owned = &module.detect(&world_at(now))[0];
    assert!(module.critical_override(owned));

    let foreign = Signal::new("cost_spike", Urgency::Critical, "spike");
    assert!(!module.critical_override(&foreign));
}

#[test]
fn bid_above_cap_is_a_violation() {
    let now = 1_000 * MINUTE;
    let module = module_with(60, now);
    let directives = vec![Directive::ToolCall {
        name: "hattrick_bid".into(),
        params: JsonBody::Json(json!({"player": "Kovacs", "amount": 600_000})),
    }];
    let violations = module.audit_violations(&directives, &world_at(now));
    assert_eq!(violations.len(), 1);
    assert!(violations[0].contains("exceeds cap"));
}

#[test]
fn bid_within_cap_passes_audit() {
    let now = 1_000 * MINUTE;
    let module = module_with(60, now);
    let directives = vec![Directive::ToolCall {
        name: "hattrick_bid".into(),
        params: JsonBody::Json(json!({"player": "Kovacs", "amount": 400_000})),
    }];
    assert!(module.audit_violations(&directives, &world_at(now)).is_empty());
}

#[test]
fn brief_names_the_cap() {
    let now = 1_000 * MINUTE;
    let module = module_with(60, now);
    let signal = &module.detect(&world_at(now))[0];
    let brief = module.signal_brief(signal).unwrap();
    assert!(brief.contains("500000"));
}
