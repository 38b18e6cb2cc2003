//! Quiet-hours window with midnight wrap-around

use serde::{Deserialize, Serialize};

/// A wrap-around wall-clock interval during which outbound messages are
/// suppressed unless a critical module signal overrides.
///
/// `start == end` disables quiet hours entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    /// First quiet hour, 0..=23.
    pub start: u32,
    /// First non-quiet hour, 0..=23.
    pub end: u32,
}

impl QuietHours {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start % 24,
            end: end % 24,
        }
    }

    /// Whether the given local hour falls inside the window.
    ///
    /// With `start=23, end=8`: hour 0 is quiet, hour 8 is not, hour 22
    /// is not.
    pub fn contains_hour(&self, hour: u32) -> bool {
        let hour = hour % 24;
        if self.start == self.end {
            return false;
        }
        if self.start < self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        // 23:00–08:00 local
        Self { start: 23, end: 8 }
    }
}

#[cfg(test)]
#[path = "quiet_tests.rs"]
mod tests;
