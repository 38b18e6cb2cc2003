// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for minder: atomic K/V state, the authoritative goal
//! store, and per-cycle audit artefacts.

mod diffs;
mod goals;
mod kv;

pub use diffs::{DiffStore, DiffStoreError};
pub use goals::{
    AddGoalOptions, GoalFilter, GoalStore, GoalStoreError, GoalUpdateFields, MilestoneCompletion,
};
pub use kv::{KvError, KvStore};
