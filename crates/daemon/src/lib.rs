// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! minder-daemon library: startup, wiring, and the run loop behind the
//! `minderd` binary.

pub mod lifecycle;
pub mod world_file;

pub use lifecycle::{run, startup, Daemon, DaemonPaths, FileConfig, LifecycleError};
pub use world_file::FileWorldProvider;
