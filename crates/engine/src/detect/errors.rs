//! Error spike detector over the analytics store snapshot.

use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, Signal, Urgency};

const ALERT_COOLDOWN_MS: u64 = 3_600_000;

/// Compare the most recent hour of errors to the prior hour. A high
/// spike also requests a direct alert (`data.alert`), rate-limited to
/// one per hour via `last_error_spike_alert_at`.
pub fn error_spike(world: &WorldSnapshot, state: &mut CycleState) -> Vec<Signal> {
    let Some(spike) = &world.error_spike else {
        return Vec::new();
    };
    let urgency = if spike.recent_count >= 10 && spike.ratio() >= 2.0 {
        Urgency::High
    } else if spike.recent_count >= 5 {
        Urgency::Medium
    } else {
        return Vec::new();
    };

    let mut signal = Signal::new(
        types::ERROR_SPIKE,
        urgency,
        format!(
            "{} errors in the last hour (vs {} the hour before)",
            spike.recent_count, spike.prior_count
        ),
    );
    if let Some(module) = &spike.top_module {
        signal = signal.with("module", module.clone());
    }
    if urgency == Urgency::High
        && world.now_ms.saturating_sub(state.last_error_spike_alert_at) >= ALERT_COOLDOWN_MS
    {
        state.last_error_spike_alert_at = world.now_ms;
        signal = signal.with("alert", true);
    }
    vec![signal]
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
