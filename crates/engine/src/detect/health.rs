//! Process and memory-service health detectors.

use crate::world::{MemoryTier, WorldSnapshot};
use minder_core::{signal::types, CycleState, Signal, Urgency};

const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 24 * HOUR_MS;
/// Rate limit for CRITICAL/RESTART out-of-band alerts.
const MEMORY_ALERT_COOLDOWN_MS: u64 = HOUR_MS;
/// Stale-memory cap per cycle.
const STALE_MEMORY_CAP: usize = 3;

/// Tiered heap/RSS pressure. Mutates `last_memory_alert_at` to rate-
/// limit CRITICAL alerts; the supervisor sends the alert when
/// `data.alert` is set.
pub fn memory_pressure(world: &WorldSnapshot, state: &mut CycleState) -> Vec<Signal> {
    let tier = world.memory.tier;
    let urgency = match tier {
        MemoryTier::Normal => return Vec::new(),
        MemoryTier::Warn => Urgency::Low,
        MemoryTier::Shed => Urgency::Medium,
        MemoryTier::Critical | MemoryTier::Restart => Urgency::High,
    };
    let mut signal = Signal::new(
        types::MEMORY_PRESSURE,
        urgency,
        format!(
            "memory tier {} (rss {} MB)",
            tier.label(),
            world.memory.rss_bytes / (1024 * 1024)
        ),
    )
    .with("tier", tier.label());

    if matches!(tier, MemoryTier::Critical | MemoryTier::Restart)
        && world.now_ms.saturating_sub(state.last_memory_alert_at) >= MEMORY_ALERT_COOLDOWN_MS
    {
        state.last_memory_alert_at = world.now_ms;
        signal = signal.with("alert", true);
    }
    vec![signal]
}

/// External memory service unreachable.
pub fn mcp_disconnected(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    if world.mcp.reachable {
        return Vec::new();
    }
    let urgency = if world.mcp.consecutive_failures >= 3 {
        Urgency::High
    } else {
        Urgency::Medium
    };
    vec![Signal::new(
        types::MCP_DISCONNECTED,
        urgency,
        format!(
            "memory service unreachable ({} consecutive failures)",
            world.mcp.consecutive_failures
        ),
    )]
}

/// Per-tier memory items unvisited for five days, capped per cycle.
pub fn stale_memories(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    world
        .memories
        .iter()
        .filter(|m| world.now_ms.saturating_sub(m.last_accessed_at) > 5 * DAY_MS)
        .take(STALE_MEMORY_CAP)
        .map(|m| {
            Signal::new(
                types::STALE_MEMORY,
                Urgency::Low,
                format!("{} memory {} untouched for 5d+", m.tier, m.id),
            )
            .with("memory_id", m.id.clone())
            .with("last_check_at", m.last_accessed_at)
        })
        .collect()
}

/// Bot-authored memory file going stale.
pub fn stale_bot_memory(world: &WorldSnapshot, _state: &mut CycleState) -> Vec<Signal> {
    let Some(modified_at) = world.bot_memory_modified_at else {
        return Vec::new();
    };
    let age_ms = world.now_ms.saturating_sub(modified_at);
    let urgency = if age_ms >= 72 * HOUR_MS {
        Urgency::Medium
    } else if age_ms >= 24 * HOUR_MS {
        Urgency::Low
    } else {
        return Vec::new();
    };
    vec![Signal::new(
        types::STALE_BOT_MEMORY,
        urgency,
        format!(
            "bot memory file unchanged for {}",
            minder_core::format_elapsed_ms(age_ms)
        ),
    )
    .with("path", "bot-memory")
    .with("last_check_at", modified_at)]
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
