use super::*;
use minder_adapters::ErrorSpike;

const HOUR: u64 = 3_600_000;

fn world_with_spike(recent: u64, prior: u64, now: u64) -> WorldSnapshot {
    WorldSnapshot {
        now_ms: now,
        error_spike: Some(ErrorSpike {
            recent_count: recent,
            prior_count: prior,
            top_module: Some("scraper".into()),
        }),
        ..Default::default()
    }
}

#[test]
fn twelve_vs_four_is_high_with_alert() {
    let now = 100 * HOUR;
    let mut state = CycleState::default();
    state.last_error_spike_alert_at = now - 2 * HOUR;

    let signals = error_spike(&world_with_spike(12, 4, now), &mut state);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].urgency, Urgency::High);
    assert_eq!(signals[0].data["alert"], true);
    assert_eq!(signals[0].data["module"], "scraper");
    assert_eq!(state.last_error_spike_alert_at, now);
}

#[test]
fn alert_respects_one_hour_cooldown() {
    let now = 100 * HOUR;
    let mut state = CycleState::default();
    state.last_error_spike_alert_at = now - HOUR / 2;

    let signals = error_spike(&world_with_spike(12, 4, now), &mut state);
    assert!(signals[0].data.get("alert").is_none());
    assert_eq!(state.last_error_spike_alert_at, now - HOUR / 2, "not restamped");
}

#[test]
fn moderate_count_is_medium_without_alert() {
    let now = 100 * HOUR;
    let mut state = CycleState::default();
    let signals = error_spike(&world_with_spike(6, 5, now), &mut state);
    assert_eq!(signals[0].urgency, Urgency::Medium);
    assert!(signals[0].data.get("alert").is_none());
}

#[test]
fn high_count_low_ratio_is_medium() {
    let now = 100 * HOUR;
    let mut state = CycleState::default();
    let signals = error_spike(&world_with_spike(12, 11, now), &mut state);
    assert_eq!(signals[0].urgency, Urgency::Medium);
}

#[test]
fn few_errors_are_silent() {
    let now = 100 * HOUR;
    let mut state = CycleState::default();
    assert!(error_spike(&world_with_spike(4, 0, now), &mut state).is_empty());
    assert!(error_spike(&WorldSnapshot::default(), &mut state).is_empty());
}
