//! World extras sourced from a collaborator-written JSON file.
//!
//! The messaging handler, cron runtime and health checker run in other
//! processes; each cycle they leave their view of the world in
//! `data/state/world.json` and the daemon reads it fresh. A missing or
//! corrupt file degrades to an empty snapshot rather than failing the
//! cycle.

use minder_engine::{WorldExtras, WorldProvider};
use std::path::PathBuf;
use tracing::warn;

/// Reads [`WorldExtras`] from a JSON file every cycle.
pub struct FileWorldProvider {
    path: PathBuf,
}

impl FileWorldProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WorldProvider for FileWorldProvider {
    fn extras(&self, _now_ms: u64) -> WorldExtras {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return WorldExtras::default(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(extras) => extras,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable world file");
                WorldExtras::default()
            }
        }
    }
}

#[cfg(test)]
#[path = "world_file_tests.rs"]
mod tests;
