//! Per-cycle audit artefacts: prompt, reply, and structured diff.
//!
//! Written plain so a human can review cycles offline with nothing but
//! a pager. Retention is time-based and runs during maintenance.

use crate::kv::write_atomic;
use minder_core::CycleDiff;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors from diff-store operations.
#[derive(Debug, Error)]
pub enum DiffStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stores `cycle-<N>-prompt.txt`, `cycle-<N>-reply.txt` and
/// `cycle-<N>.json` under one directory.
pub struct DiffStore {
    dir: PathBuf,
}

impl DiffStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DiffStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn json_path(&self, cycle: u64) -> PathBuf {
        self.dir.join(format!("cycle-{cycle}.json"))
    }

    /// Persist one cycle's artefacts.
    pub fn write(
        &self,
        diff: &CycleDiff,
        prompt: &str,
        reply: &str,
    ) -> Result<(), DiffStoreError> {
        let cycle = diff.cycle;
        write_atomic(
            &self.dir.join(format!("cycle-{cycle}-prompt.txt")),
            prompt.as_bytes(),
        )?;
        write_atomic(
            &self.dir.join(format!("cycle-{cycle}-reply.txt")),
            reply.as_bytes(),
        )?;
        write_atomic(&self.json_path(cycle), &serde_json::to_vec_pretty(diff)?)?;
        Ok(())
    }

    pub fn load(&self, cycle: u64) -> Result<Option<CycleDiff>, DiffStoreError> {
        let path = self.json_path(cycle);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Delete artefacts whose cycle record is older than `max_age_ms`.
    /// Returns the number of cycles pruned.
    pub fn prune_older_than(&self, now_ms: u64, max_age_ms: u64) -> Result<usize, DiffStoreError> {
        let mut pruned = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(cycle) = parse_cycle_json_name(&name.to_string_lossy()) else {
                continue;
            };
            let Some(diff) = self.load(cycle)? else {
                continue;
            };
            if now_ms.saturating_sub(diff.ts) > max_age_ms {
                for suffix in ["-prompt.txt", "-reply.txt", ".json"] {
                    let _ = fs::remove_file(self.dir.join(format!("cycle-{cycle}{suffix}")));
                }
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(pruned, "pruned old cycle diffs");
        }
        Ok(pruned)
    }
}

/// `cycle-12.json` → `Some(12)`; prompt/reply files → `None`.
fn parse_cycle_json_name(name: &str) -> Option<u64> {
    name.strip_prefix("cycle-")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[cfg(test)]
#[path = "diffs_tests.rs"]
mod tests;
