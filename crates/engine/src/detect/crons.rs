//! Cron health detectors.

use crate::world::WorldSnapshot;
use minder_core::{signal::types, CycleState, Signal, Urgency};

/// Engagement floor below which a cron is flagged.
const ENGAGEMENT_THRESHOLD: f64 = 0.2;
/// Deliveries required before engagement is judged at all.
const MIN_DELIVERIES: u64 = 10;

/// Enabled crons with consecutive errors.
pub fn failing_crons(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .crons
        .iter()
        .filter(|c| c.enabled && c.consecutive_errors >= 3)
        .map(|c| {
            let urgency = if c.consecutive_errors >= 5 {
                Urgency::High
            } else {
                Urgency::Medium
            };
            Signal::new(
                types::FAILING_CRON,
                urgency,
                format!("cron \"{}\" failed {} times in a row", c.name, c.consecutive_errors),
            )
            .with("cron_id", c.id.clone())
        })
        .collect()
}

/// Crons the user has stopped engaging with.
pub fn low_engagement_crons(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .crons
        .iter()
        .filter(|c| {
            c.enabled && c.deliveries >= MIN_DELIVERIES && c.engagement_rate < ENGAGEMENT_THRESHOLD
        })
        .map(|c| {
            Signal::new(
                types::LOW_ENGAGEMENT_CRON,
                Urgency::Low,
                format!(
                    "cron \"{}\" engagement is {:.0}% over {} deliveries",
                    c.name,
                    c.engagement_rate * 100.0,
                    c.deliveries
                ),
            )
            .with("cron_id", c.id.clone())
        })
        .collect()
}

#[cfg(test)]
#[path = "crons_tests.rs"]
mod tests;
