//! Daemon startup, wiring and the run loop.

use crate::world_file::FileWorldProvider;
use fs2::FileExt;
use minder_adapters::{
    AnthropicSession, GitAutoCoder, HttpMessaging, LlmBackend, MemoryErrorAnalytics,
    NoOpMessaging, NoOpNotify, NoOpToolBridge, Notify, OpenAiBackend, TelegramNotify,
    TokenPricing,
};
use minder_adapters::{env, BackendKind, Messaging};
use minder_core::SystemClock;
use minder_engine::{
    AgentModule, Config, Dispatcher, HattrickModule, MemoryLearningStore, NoChainRunner,
    PermissiveTrust, Router, StaticGate, Supervisor, SupervisorDeps, TransferWatch,
};
use minder_storage::{DiffStore, GoalStore, KvStore};
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Errors during startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another minderd instance holds the lock")]
    LockFailed,
    #[error("state store error: {0}")]
    Kv(#[from] minder_storage::KvError),
    #[error("goal store error: {0}")]
    Goals(#[from] minder_storage::GoalStoreError),
    #[error("diff store error: {0}")]
    Diffs(#[from] minder_storage::DiffStoreError),
    #[error("config error: {0}")]
    Config(String),
}

/// Filesystem layout under the base directory.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub base_dir: PathBuf,
    pub state_dir: PathBuf,
    pub goals_path: PathBuf,
    pub diffs_dir: PathBuf,
    pub world_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_dir: PathBuf,
    pub config_path: PathBuf,
}

impl DaemonPaths {
    /// Resolve from `MINDER_HOME`, falling back to the platform data
    /// directory.
    pub fn resolve() -> Self {
        let base_dir = env::string("MINDER_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::data_local_dir().map(|d| d.join("minder")))
            .unwrap_or_else(|| PathBuf::from(".minder"));
        Self::under(base_dir)
    }

    pub fn under(base_dir: PathBuf) -> Self {
        let data = base_dir.join("data");
        Self {
            state_dir: data.join("state"),
            goals_path: data.join("goals.json"),
            diffs_dir: data.join("cycle-diffs"),
            world_path: data.join("state/world.json"),
            lock_path: base_dir.join("minderd.lock"),
            log_dir: base_dir.join("logs"),
            config_path: base_dir.join("minder.toml"),
            base_dir,
        }
    }
}

/// Optional `minder.toml`, overridden by environment variables.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub telegram: TelegramSection,
    pub messaging: MessagingSection,
    pub anthropic: AnthropicSection,
    pub hattrick: HattrickSection,
    pub gate: GateSection,
    pub repo: RepoSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelegramSection {
    pub token: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MessagingSection {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnthropicSection {
    pub base_url: String,
    pub api_key: Option<String>,
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl Default for AnthropicSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HattrickSection {
    pub watchlist: Vec<WatchEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchEntry {
    pub player: String,
    pub deadline_at: u64,
    pub max_bid: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSection {
    pub score: u8,
}

impl Default for GateSection {
    fn default() -> Self {
        Self { score: 5 }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RepoSection {
    pub root: Option<String>,
}

impl FileConfig {
    pub fn load(paths: &DaemonPaths) -> Result<Self, LifecycleError> {
        if !paths.config_path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&paths.config_path)?;
        toml::from_str(&text).map_err(|e| LifecycleError::Config(e.to_string()))
    }
}

/// A started daemon holding the instance lock.
pub struct Daemon {
    pub supervisor: Arc<Supervisor<SystemClock>>,
    _lock: File,
}

/// Acquire the single-instance lock, open the stores and wire the
/// supervisor.
pub fn startup(paths: &DaemonPaths, config: Config) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&paths.base_dir)?;
    let mut lock = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock.try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed)?;
    lock.set_len(0)?;
    writeln!(lock, "{}", std::process::id())?;

    let file_config = FileConfig::load(paths)?;

    let kv = Arc::new(KvStore::open(&paths.state_dir)?);
    let goals = Arc::new(GoalStore::open(&paths.goals_path)?);
    let diffs = Arc::new(DiffStore::open(&paths.diffs_dir)?);

    // LLM backends discovered from the environment
    let backends: Vec<Arc<dyn LlmBackend>> = config
        .discovered_backends
        .iter()
        .map(|b| {
            let kind = if b.local {
                BackendKind::Local
            } else {
                BackendKind::HostedFree
            };
            Arc::new(OpenAiBackend::new(
                b.name.clone(),
                b.base_url.clone(),
                b.model.clone(),
                b.api_key.clone(),
                kind,
            )) as Arc<dyn LlmBackend>
        })
        .collect();
    info!(count = backends.len(), "free backends registered");

    let anthropic = &file_config.anthropic;
    let api_key = env::string("MINDER_ANTHROPIC_API_KEY")
        .or_else(|| anthropic.api_key.clone())
        .unwrap_or_default();
    if api_key.is_empty() {
        warn!("no paid API key configured; paid-tier cycles will fail over to free backends");
    }
    let session = Arc::new(AnthropicSession::new(
        anthropic.base_url.clone(),
        config.sonnet_model.clone(),
        api_key,
        TokenPricing {
            input_per_mtok: anthropic.input_per_mtok,
            output_per_mtok: anthropic.output_per_mtok,
        },
    ));

    let tools: Arc<dyn minder_adapters::ToolBridge> = Arc::new(NoOpToolBridge);
    let router = Router::new(backends, session, Arc::clone(&tools));

    let messaging: Arc<dyn Messaging> = match env::string("MINDER_MESSAGING_URL")
        .or_else(|| file_config.messaging.base_url.clone())
    {
        Some(url) => Arc::new(HttpMessaging::new(url, Duration::from_secs(15))),
        None => Arc::new(NoOpMessaging),
    };
    let notify: Arc<dyn Notify> = match (
        env::string("MINDER_TELEGRAM_TOKEN").or_else(|| file_config.telegram.token.clone()),
        env::string("MINDER_TELEGRAM_CHAT_ID").or_else(|| file_config.telegram.chat_id.clone()),
    ) {
        (Some(token), Some(chat_id)) => Arc::new(TelegramNotify::new(token, chat_id)),
        _ => Arc::new(NoOpNotify),
    };

    let repo_root = env::string("MINDER_REPO_ROOT")
        .or_else(|| file_config.repo.root.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.base_dir.clone());
    let autocoder: Arc<dyn minder_adapters::AutoCoder> =
        Arc::new(GitAutoCoder::new(repo_root, config.test_command.clone()));

    let modules: Vec<Box<dyn AgentModule>> = if file_config.hattrick.watchlist.is_empty() {
        Vec::new()
    } else {
        vec![Box::new(HattrickModule::new(
            file_config
                .hattrick
                .watchlist
                .iter()
                .map(|w| TransferWatch {
                    player: w.player.clone(),
                    deadline_at: w.deadline_at,
                    max_bid: w.max_bid,
                })
                .collect(),
        ))]
    };

    let dispatcher = Dispatcher::new(
        Arc::clone(&goals),
        messaging,
        Arc::clone(&notify),
        tools,
        Arc::clone(&autocoder),
        Arc::new(StaticGate {
            score: file_config.gate.score,
        }),
        Arc::new(PermissiveTrust),
        Arc::new(MemoryLearningStore::new()),
        Arc::new(NoChainRunner),
        config.confidence_gate_enabled,
        config.confidence_gate_min_score,
        config.max_followups,
    );

    let deps = SupervisorDeps {
        kv,
        goals,
        diffs,
        router,
        dispatcher,
        analytics: Arc::new(MemoryErrorAnalytics::new()),
        notify,
        autocoder,
        world_provider: Arc::new(FileWorldProvider::new(&paths.world_path)),
        modules,
    };

    Ok(Daemon {
        supervisor: Arc::new(Supervisor::new(config, SystemClock, deps)),
        _lock: lock,
    })
}

/// Warm-up delay before the first cycle.
const FIRST_CYCLE_DELAY: Duration = Duration::from_secs(5);

/// Drive the chained one-shot schedule until a shutdown signal.
///
/// Cycles never overlap: each iteration awaits the previous cycle's
/// completion and replaces the timer with the delay it computed. An
/// in-flight cycle finishes before shutdown; state is persisted by the
/// cycle itself.
pub async fn run(daemon: &Daemon) -> Result<(), LifecycleError> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut delay = FIRST_CYCLE_DELAY;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                match daemon.supervisor.run_cycle().await {
                    Ok(outcome) => {
                        info!(
                            kind = outcome.kind.label(),
                            picked = outcome.picked,
                            next_s = outcome.next_delay.as_secs(),
                            "cycle finished"
                        );
                        delay = outcome.next_delay;
                    }
                    Err(e) => {
                        error!(error = %e, "cycle refused to run");
                        delay = daemon.supervisor.config().loop_interval;
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("SIGTERM, shutting down between cycles");
                break;
            }
            _ = sigint.recv() => {
                info!("SIGINT, shutting down between cycles");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
