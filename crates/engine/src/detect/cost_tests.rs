use super::*;
use minder_core::cycle::DailyCost;

const HOUR: u64 = 3_600_000;

fn state_with(today: f64, avg: f64) -> CycleState {
    let mut state = CycleState::default();
    state.daily_cost = today;
    state.daily_cost_history.push(DailyCost {
        date: "2026-02-28".into(),
        cost_usd: avg,
    });
    state
}

fn world_at(now: u64) -> WorldSnapshot {
    WorldSnapshot {
        now_ms: now,
        ..Default::default()
    }
}

#[test]
fn spike_over_three_x_is_high() {
    let mut state = state_with(0.45, 0.10);
    let signals = cost_spike(&world_at(100 * HOUR), &mut state);
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].urgency, Urgency::High);
    assert_eq!(state.last_cost_spike_signal_at, 100 * HOUR, "debounce stamped");
}

#[test]
fn spike_between_thresholds_is_medium() {
    let mut state = state_with(0.18, 0.10);
    let signals = cost_spike(&world_at(100 * HOUR), &mut state);
    assert_eq!(signals[0].urgency, Urgency::Medium);
}

#[test]
fn below_floor_is_silent() {
    // 10x the average but under the absolute floor
    let mut state = state_with(0.09, 0.009);
    assert!(cost_spike(&world_at(100 * HOUR), &mut state).is_empty());
}

#[test]
fn no_history_no_spike() {
    let mut state = CycleState::default();
    state.daily_cost = 0.50;
    assert!(cost_spike(&world_at(100 * HOUR), &mut state).is_empty());
}

#[test]
fn debounce_suppresses_repeat_within_six_hours() {
    let mut state = state_with(0.45, 0.10);
    assert_eq!(cost_spike(&world_at(100 * HOUR), &mut state).len(), 1);
    assert!(cost_spike(&world_at(102 * HOUR), &mut state).is_empty());
    assert_eq!(cost_spike(&world_at(107 * HOUR), &mut state).len(), 1);
}

#[test]
fn disabled_tracking_suppresses() {
    let mut state = state_with(0.45, 0.10);
    let mut world = world_at(100 * HOUR);
    world.cost_tracking_enabled = false;
    assert!(cost_spike(&world, &mut state).is_empty());
}
