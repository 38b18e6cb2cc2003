// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! minder-engine: the agent cycle engine.
//!
//! One supervisor pass collects signals from detectors, arbitrates
//! which reach the model, composes a prompt, routes it to a backend,
//! parses the tagged reply, and dispatches the effects. The daemon
//! crate wires concrete adapters and drives the chained schedule.

pub mod arbiter;
pub mod composer;
pub mod config;
pub mod detect;
pub mod dispatcher;
pub mod error;
pub mod gates;
pub mod module;
pub mod parser;
pub mod router;
pub mod supervisor;
pub mod world;

pub use composer::{clamp_cycle_minutes, decide_kind, CycleKind};
pub use config::{discover_backends, BackendConfig, Config};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{classify_message, CycleError, ErrorClass};
pub use gates::{
    ChainRunner, GateEvaluator, LearningStore, MemoryLearningStore, NoChainRunner,
    PermissiveTrust, StaticGate, TrustEvaluator,
};
pub use module::{AgentModule, HattrickModule, TransferWatch};
pub use parser::{parse, ParseOutcome};
pub use router::{choose_tier, Router, Tier};
pub use supervisor::{CycleOutcome, Supervisor, SupervisorDeps};
pub use world::{
    CronHealth, MemoryStats, MemoryTier, StaticWorldProvider, WorldExtras, WorldProvider,
    WorldSnapshot,
};
