//! Pluggable agent modules.
//!
//! Modules contribute detectors, context blocks, per-signal briefs,
//! message routing and quiet-hour overrides without the engine knowing
//! their domain. The hattrick module ships in-tree as the concrete
//! instance.

use crate::world::WorldSnapshot;
use minder_adapters::MessageCategory;
use minder_core::{signal::types, Directive, Signal, Urgency};

/// A registered module.
pub trait AgentModule: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Extra detectors, run after the core set in registration order.
    fn detect(&self, world: &WorldSnapshot) -> Vec<Signal>;

    /// Whether a signal type belongs to this module (drives routing
    /// and quiet-hour overrides).
    fn owns_signal(&self, signal_type: &str) -> bool;

    /// Optional labelled context block for the prompt.
    fn context_block(&self, _world: &WorldSnapshot) -> Option<(String, String)> {
        None
    }

    /// Optional brief appended to the prompt for a picked signal.
    fn signal_brief(&self, _signal: &Signal) -> Option<String> {
        None
    }

    /// Signal types that require the paid tier beyond the core set.
    fn sonnet_signal_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Message category for signals this module owns.
    fn message_category(&self) -> MessageCategory {
        MessageCategory::Daily
    }

    /// A critical signal owned by this module overrides quiet hours.
    fn critical_override(&self, signal: &Signal) -> bool {
        signal.urgency == Urgency::Critical && self.owns_signal(&signal.signal_type)
    }

    /// Revalidate a reply against module limits (e.g. bid caps).
    /// Violations are logged and surfaced, never auto-reversed.
    fn audit_violations(&self, _directives: &[Directive], _world: &WorldSnapshot) -> Vec<String> {
        Vec::new()
    }
}

/// One watched transfer with a hard deadline.
#[derive(Debug, Clone)]
pub struct TransferWatch {
    pub player: String,
    pub deadline_at: u64,
    /// Hard cap on any bid the agent may place, in the game currency.
    pub max_bid: u64,
}

/// Hattrick module: transfer-deadline watchlist and bid-cap audit.
pub struct HattrickModule {
    watchlist: Vec<TransferWatch>,
}

impl HattrickModule {
    pub fn new(watchlist: Vec<TransferWatch>) -> Self {
        Self { watchlist }
    }
}

const MINUTE_MS: u64 = 60_000;

impl AgentModule for HattrickModule {
    fn name(&self) -> &str {
        "hattrick"
    }

    fn detect(&self, world: &WorldSnapshot) -> Vec<Signal> {
        let mut signals = Vec::new();
        for watch in &self.watchlist {
            let remaining = watch.deadline_at.saturating_sub(world.now_ms);
            if watch.deadline_at <= world.now_ms {
                continue;
            }
            let urgency = if remaining <= 30 * MINUTE_MS {
                Urgency::Critical
            } else if remaining <= 90 * MINUTE_MS {
                Urgency::High
            } else {
                continue;
            };
            signals.push(
                Signal::new(
                    types::TRANSFER_DEADLINE,
                    urgency,
                    format!(
                        "transfer for {} closes in {}m",
                        watch.player,
                        remaining / MINUTE_MS
                    ),
                )
                .with("topic", watch.player.clone())
                .with("module", "hattrick")
                .with("max_bid", watch.max_bid),
            );
        }
        signals
    }

    fn owns_signal(&self, signal_type: &str) -> bool {
        signal_type == types::TRANSFER_DEADLINE
    }

    fn context_block(&self, world: &WorldSnapshot) -> Option<(String, String)> {
        if self.watchlist.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .watchlist
            .iter()
            .map(|w| {
                let remaining = w.deadline_at.saturating_sub(world.now_ms) / MINUTE_MS;
                format!("{} - deadline in {}m, max bid {}", w.player, remaining, w.max_bid)
            })
            .collect();
        Some(("Transfer watchlist".to_string(), lines.join("\n")))
    }

    fn signal_brief(&self, signal: &Signal) -> Option<String> {
        if !self.owns_signal(&signal.signal_type) {
            return None;
        }
        let player = signal.data.get("topic")?.as_str()?;
        let max_bid = signal.data.get("max_bid")?.as_u64()?;
        Some(format!(
            "Transfer brief: {player} is closing. Never bid above {max_bid}. \
             Reply with a <wa_message> recommendation; place bids only through \
             <tool_call name=\"hattrick_bid\">."
        ))
    }

    fn message_category(&self) -> MessageCategory {
        MessageCategory::Hattrick
    }

    fn audit_violations(&self, directives: &[Directive], _world: &WorldSnapshot) -> Vec<String> {
        let mut violations = Vec::new();
        for directive in directives {
            let Directive::ToolCall { name, params } = directive else {
                continue;
            };
            if name != "hattrick_bid" {
                continue;
            }
            let Some(bid) = params
                .as_json()
                .and_then(|p| p.get("amount"))
                .and_then(|v| v.as_u64())
            else {
                continue;
            };
            let player = params
                .as_json()
                .and_then(|p| p.get("player"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            for watch in &self.watchlist {
                if watch.player == player && bid > watch.max_bid {
                    violations.push(format!(
                        "bid {bid} for {player} exceeds cap {}",
                        watch.max_bid
                    ));
                }
            }
        }
        violations
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
