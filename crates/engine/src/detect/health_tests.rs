use super::*;
use crate::world::{McpStatus, MemoryRecord, MemoryStats};
use yare::parameterized;

const HOUR: u64 = 3_600_000;
const DAY: u64 = 24 * HOUR;

fn world_with_tier(tier: MemoryTier, now: u64) -> WorldSnapshot {
    WorldSnapshot {
        now_ms: now,
        memory: MemoryStats {
            tier,
            heap_bytes: 0,
            rss_bytes: 512 * 1024 * 1024,
        },
        ..Default::default()
    }
}

#[parameterized(
    normal = { MemoryTier::Normal, None },
    warn = { MemoryTier::Warn, Some(Urgency::Low) },
    shed = { MemoryTier::Shed, Some(Urgency::Medium) },
    critical = { MemoryTier::Critical, Some(Urgency::High) },
    restart = { MemoryTier::Restart, Some(Urgency::High) },
)]
fn memory_tiers(tier: MemoryTier, expected: Option<Urgency>) {
    let mut state = CycleState::default();
    let signals = memory_pressure(&world_with_tier(tier, 100 * HOUR), &mut state);
    assert_eq!(signals.first().map(|s| s.urgency), expected);
}

#[test]
fn critical_alert_is_rate_limited() {
    let mut state = CycleState::default();

    let first = memory_pressure(&world_with_tier(MemoryTier::Critical, 100 * HOUR), &mut state);
    assert_eq!(first[0].data.get("alert"), Some(&serde_json::Value::Bool(true)));

    // Half an hour later: signal still fires, alert suppressed
    let second = memory_pressure(
        &world_with_tier(MemoryTier::Critical, 100 * HOUR + HOUR / 2),
        &mut state,
    );
    assert_eq!(second.len(), 1);
    assert!(second[0].data.get("alert").is_none());

    let third = memory_pressure(
        &world_with_tier(MemoryTier::Critical, 102 * HOUR),
        &mut state,
    );
    assert!(third[0].data.get("alert").is_some());
}

#[test]
fn mcp_urgency_scales_with_failures() {
    let mut state = CycleState::default();
    let mut world = WorldSnapshot {
        mcp: McpStatus {
            reachable: false,
            consecutive_failures: 1,
        },
        ..Default::default()
    };
    assert_eq!(
        mcp_disconnected(&world, &mut state)[0].urgency,
        Urgency::Medium
    );
    world.mcp.consecutive_failures = 3;
    assert_eq!(mcp_disconnected(&world, &mut state)[0].urgency, Urgency::High);

    world.mcp.reachable = true;
    assert!(mcp_disconnected(&world, &mut state).is_empty());
}

#[test]
fn stale_memories_are_capped_at_three() {
    let now = 100 * DAY;
    let memories = (0..5)
        .map(|i| MemoryRecord {
            id: format!("mem-{i}"),
            tier: "warm".into(),
            last_accessed_at: now - 6 * DAY,
        })
        .collect();
    let world = WorldSnapshot {
        now_ms: now,
        memories,
        ..Default::default()
    };
    let mut state = CycleState::default();
    let signals = stale_memories(&world, &mut state);
    assert_eq!(signals.len(), 3);
    assert!(signals.iter().all(|s| s.urgency == Urgency::Low));
    assert!(signals[0].last_check_at().is_some());
}

#[parameterized(
    fresh = { 12, None },
    day_old = { 30, Some(Urgency::Low) },
    three_days = { 80, Some(Urgency::Medium) },
)]
fn bot_memory_staleness(age_hours: u64, expected: Option<Urgency>) {
    let now = 1_000 * HOUR;
    let world = WorldSnapshot {
        now_ms: now,
        bot_memory_modified_at: Some(now - age_hours * HOUR),
        ..Default::default()
    };
    let mut state = CycleState::default();
    let signals = stale_bot_memory(&world, &mut state);
    assert_eq!(signals.first().map(|s| s.urgency), expected);
}
