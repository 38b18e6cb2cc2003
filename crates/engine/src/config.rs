//! Engine configuration, environment-driven.
//!
//! Every knob has a default so a bare environment boots. LLM backends
//! are discovered by the `LLM_<NAME>_ENABLED` / `_BASE_URL` / `_MODEL` /
//! `_API_KEY` convention.

use minder_adapters::env;
use minder_core::QuietHours;
use std::collections::BTreeMap;
use std::time::Duration;

/// A free/local backend discovered from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Local servers are preferred over hosted-free ones.
    pub local: bool,
}

/// Full engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default delay between cycles.
    pub loop_interval: Duration,
    /// Model name for routine (free/local) cycles.
    pub routine_model: String,
    /// Model name for paid (Sonnet-class) cycles.
    pub sonnet_model: String,
    /// Bound on `pending_followups`.
    pub max_followups: usize,
    /// Consecutive backend cycles before one skip.
    pub backoff_threshold: u32,
    /// Reflection cadence: every Nth signal-free cycle reflects.
    pub always_think_every: u64,
    /// Short delay after a productive cycle.
    pub recycle_delay: Duration,
    /// Cap on consecutive short recycles.
    pub max_consecutive_recycles: u32,
    pub quiet_hours: QuietHours,
    /// Extended delay while quiet and nothing urgent is pending.
    pub quiet_delay: Duration,
    pub daily_cost_limit: f64,
    pub cost_tracking_enabled: bool,
    /// IANA timezone for wall-clock decisions.
    pub timezone: chrono_tz::Tz,
    pub confidence_gate_enabled: bool,
    /// Gate scores below this ask the user instead of executing.
    pub confidence_gate_min_score: u8,
    /// Auto-coder test suite, run through `sh -c`.
    pub test_command: String,
    /// Absolute LLM call timeout.
    pub llm_timeout: Duration,
    pub discovered_backends: Vec<BackendConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_interval: Duration::from_secs(15 * 60),
            routine_model: "qwen2.5-coder".to_string(),
            sonnet_model: "claude-sonnet-4-5".to_string(),
            max_followups: 5,
            backoff_threshold: 10,
            always_think_every: 4,
            recycle_delay: Duration::from_secs(2 * 60),
            max_consecutive_recycles: 3,
            quiet_hours: QuietHours::default(),
            quiet_delay: Duration::from_secs(60 * 60),
            daily_cost_limit: 1.0,
            cost_tracking_enabled: true,
            timezone: chrono_tz::UTC,
            confidence_gate_enabled: true,
            confidence_gate_min_score: 4,
            test_command: "cargo test --quiet".to_string(),
            llm_timeout: Duration::from_secs(15 * 60),
            discovered_backends: Vec::new(),
        }
    }
}

impl Config {
    /// Load from the environment on top of defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timezone = env::string("MINDER_TIMEZONE")
            .and_then(|tz| tz.parse().ok())
            .unwrap_or(defaults.timezone);
        Self {
            loop_interval: env::minutes_or("MINDER_LOOP_INTERVAL_MIN", 15),
            routine_model: env::string("MINDER_ROUTINE_MODEL").unwrap_or(defaults.routine_model),
            sonnet_model: env::string("MINDER_SONNET_MODEL").unwrap_or(defaults.sonnet_model),
            max_followups: env::u64_or("MINDER_MAX_FOLLOWUPS", 5) as usize,
            backoff_threshold: env::u32_or("MINDER_BACKOFF_THRESHOLD", 10),
            always_think_every: env::u64_or("MINDER_ALWAYS_THINK_EVERY", 4).max(1),
            recycle_delay: env::minutes_or("MINDER_RECYCLE_DELAY_MIN", 2),
            max_consecutive_recycles: env::u32_or("MINDER_MAX_CONSECUTIVE_RECYCLES", 3),
            quiet_hours: QuietHours::new(
                env::hour_or("MINDER_QUIET_START", 23),
                env::hour_or("MINDER_QUIET_END", 8),
            ),
            quiet_delay: env::minutes_or("MINDER_QUIET_DELAY_MIN", 60),
            daily_cost_limit: env::f64_or("MINDER_DAILY_COST_LIMIT", 1.0),
            cost_tracking_enabled: !env::bool_or("MINDER_COST_TRACKING_DISABLED", false),
            timezone,
            confidence_gate_enabled: env::bool_or("MINDER_CONFIDENCE_GATE_ENABLED", true),
            confidence_gate_min_score: env::u32_or("MINDER_CONFIDENCE_GATE_MIN_SCORE", 4) as u8,
            test_command: env::string("MINDER_TEST_COMMAND")
                .unwrap_or(defaults.test_command),
            llm_timeout: env::minutes_or("MINDER_LLM_TIMEOUT_MIN", 15),
            discovered_backends: discover_backends(std::env::vars()),
        }
    }
}

/// Scan an environment for `LLM_<NAME>_ENABLED` backends.
pub fn discover_backends(vars: impl Iterator<Item = (String, String)>) -> Vec<BackendConfig> {
    let env_map: BTreeMap<String, String> = vars.collect();
    let mut backends = Vec::new();
    for (key, value) in &env_map {
        let Some(name) = key
            .strip_prefix("LLM_")
            .and_then(|rest| rest.strip_suffix("_ENABLED"))
        else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let enabled = matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        if !enabled {
            continue;
        }
        let lookup = |suffix: &str| {
            env_map
                .get(&format!("LLM_{name}_{suffix}"))
                .filter(|v| !v.is_empty())
                .cloned()
        };
        let Some(base_url) = lookup("BASE_URL") else {
            tracing::warn!(backend = name, "enabled backend missing BASE_URL, skipping");
            continue;
        };
        let local =
            base_url.contains("localhost") || base_url.contains("127.0.0.1");
        backends.push(BackendConfig {
            name: name.to_lowercase(),
            model: lookup("MODEL").unwrap_or_else(|| "default".to_string()),
            api_key: lookup("API_KEY"),
            base_url,
            local,
        });
    }
    // Local backends first; stable name order within each group
    backends.sort_by_key(|b| (!b.local, b.name.clone()));
    backends
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
