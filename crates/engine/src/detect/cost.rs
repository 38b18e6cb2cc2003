//! Cost spike detector.
//!
//! One of the two detectors allowed to mutate state: it debounces
//! itself via `last_cost_spike_signal_at`.

use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, Signal, Urgency};

const SPIKE_FLOOR_USD: f64 = 0.10;
const DEBOUNCE_MS: u64 = 6 * 3_600_000;

/// Today's spend against the rolling daily average.
pub fn cost_spike(world: &WorldSnapshot, state: &mut CycleState) -> Vec<Signal> {
    if !world.cost_tracking_enabled {
        return Vec::new();
    }
    let today = state.daily_cost;
    let avg = state.rolling_avg_daily_cost();
    // No baseline yet: a fresh install cannot spike
    if avg <= 0.0 {
        return Vec::new();
    }
    if today <= SPIKE_FLOOR_USD || today <= 1.5 * avg {
        return Vec::new();
    }
    if world.now_ms.saturating_sub(state.last_cost_spike_signal_at) < DEBOUNCE_MS {
        return Vec::new();
    }
    state.last_cost_spike_signal_at = world.now_ms;

    let urgency = if today > 3.0 * avg {
        Urgency::High
    } else {
        Urgency::Medium
    };
    vec![Signal::new(
        types::COST_SPIKE,
        urgency,
        format!("today's spend ${today:.2} vs ${avg:.2} daily average"),
    )
    .with("today_usd", today)
    .with("avg_usd", avg)]
}

#[cfg(test)]
#[path = "cost_tests.rs"]
mod tests;
