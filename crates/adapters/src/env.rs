//! Environment variable parsing helpers

use std::time::Duration;

pub fn string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn u64_or(name: &str, default: u64) -> u64 {
    string(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn u32_or(name: &str, default: u32) -> u32 {
    string(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn f64_or(name: &str, default: f64) -> f64 {
    string(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// `1`, `true`, `yes`, `on` (case-insensitive) are truthy.
pub fn bool_or(name: &str, default: bool) -> bool {
    match string(name) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// A 24-hour local hour, clamped into range.
pub fn hour_or(name: &str, default: u32) -> u32 {
    u32_or(name, default) % 24
}

/// Minutes expressed as a `Duration`.
pub fn minutes_or(name: &str, default_minutes: u64) -> Duration {
    Duration::from_secs(u64_or(name, default_minutes) * 60)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
