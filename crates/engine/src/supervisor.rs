//! Cycle supervisor: one serial procedure per cycle, a chained one-shot
//! schedule, and the audit trail.

use crate::arbiter;
use crate::composer::{self, ComposeInputs, CycleKind};
use crate::config::Config;
use crate::detect;
use crate::dispatcher::{DispatchContext, Dispatcher};
use crate::error::CycleError;
use crate::module::AgentModule;
use crate::parser;
use crate::router::{self, Router, Tier};
use crate::world::{WorldProvider, WorldSnapshot};
use minder_adapters::{AutoCoder, ErrorAnalytics, Notify};
use minder_core::{
    event::names, Clock, CycleDiff, CycleEvent, CycleState, EventLog, FileDiff, Signal,
    CYCLE_STATE_KEY,
};
use minder_storage::{DiffStore, GoalFilter, GoalStore, KvStore};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const DAY_MS: u64 = 24 * 3_600_000;
const WEEK_MS: u64 = 7 * DAY_MS;
/// Goal-file index sync cadence.
const INDEX_SYNC_MS: u64 = 30 * 60_000;
/// Cycle-diff retention window.
const DIFF_RETENTION_MS: u64 = 14 * DAY_MS;

/// Everything the supervisor drives.
pub struct SupervisorDeps {
    pub kv: Arc<KvStore>,
    pub goals: Arc<GoalStore>,
    pub diffs: Arc<DiffStore>,
    pub router: Router,
    pub dispatcher: Dispatcher,
    pub analytics: Arc<dyn ErrorAnalytics>,
    pub notify: Arc<dyn Notify>,
    pub autocoder: Arc<dyn AutoCoder>,
    pub world_provider: Arc<dyn WorldProvider>,
    pub modules: Vec<Box<dyn AgentModule>>,
}

/// Outcome of one supervisor pass, driving the next schedule.
#[derive(Debug)]
pub struct CycleOutcome {
    pub kind: CycleKind,
    pub picked: usize,
    pub invoked_backend: bool,
    pub next_delay: Duration,
    pub error: Option<String>,
}

/// Read-only status snapshot written for the dashboard after every
/// cycle.
#[derive(Debug, Serialize)]
struct StatusSnapshot {
    cycle_count: u64,
    last_cycle_at: u64,
    daily_cost: f64,
    pending_followups: usize,
    recent_events: Vec<CycleEvent>,
}

/// The supervisor.
pub struct Supervisor<C: Clock> {
    config: Config,
    clock: C,
    deps: SupervisorDeps,
    events: Mutex<EventLog>,
    cycle_running: AtomicBool,
    prior_cycle_errored: AtomicBool,
}

impl<C: Clock> Supervisor<C> {
    pub fn new(config: Config, clock: C, deps: SupervisorDeps) -> Self {
        Self {
            config,
            clock,
            deps,
            events: Mutex::new(EventLog::new()),
            cycle_running: AtomicBool::new(false),
            prior_cycle_errored: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Public query view of the event log: live merged with persisted.
    pub fn events(&self) -> Vec<CycleEvent> {
        let persisted = self
            .load_state()
            .map(|s| s.recent_events)
            .unwrap_or_default();
        self.events.lock().merged_with(&persisted)
    }

    fn load_state(&self) -> Option<CycleState> {
        match self.deps.kv.get_as::<CycleState>(CYCLE_STATE_KEY) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "failed to load cycle state, starting fresh");
                None
            }
        }
    }

    fn record_event(&self, state: &mut CycleState, event: CycleEvent) {
        self.events.lock().record(event.clone());
        state.push_event(event);
    }

    /// Run one cycle end to end and compute the next delay.
    ///
    /// Only one cycle may run at a time; a second entry is refused.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        if self
            .cycle_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CycleError::AlreadyRunning);
        }
        let result = self.run_cycle_inner().await;
        self.cycle_running.store(false, Ordering::SeqCst);

        match result {
            Ok(outcome) => {
                self.prior_cycle_errored.store(false, Ordering::SeqCst);
                Ok(outcome)
            }
            Err(e) => {
                // Error-recovery path: record, reset the session, persist,
                // schedule at the default delay
                self.prior_cycle_errored.store(true, Ordering::SeqCst);
                error!(error = %e, "cycle failed");
                let now_ms = self.clock.epoch_ms();
                let mut state = self.load_state().unwrap_or_default();
                self.record_event(
                    &mut state,
                    CycleEvent::new(names::CYCLE_ERROR, now_ms)
                        .with_data(json!({"error": e.to_string()})),
                );
                self.deps
                    .analytics
                    .record_error("agent-loop", &e.to_string(), now_ms);
                self.deps.router.session().reset();
                state.cycle_count += 1;
                state.last_cycle_at = now_ms;
                if let Err(persist_err) = self.persist(&state) {
                    error!(error = %persist_err, "failed to persist state after cycle error");
                }
                Ok(CycleOutcome {
                    kind: CycleKind::Skip,
                    picked: 0,
                    invoked_backend: false,
                    next_delay: self.config.loop_interval,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    async fn run_cycle_inner(&self) -> Result<CycleOutcome, CycleError> {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.load_state().unwrap_or_default();

        let utc = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now_ms as i64)
            .unwrap_or_default();
        let local = utc.with_timezone(&self.config.timezone);
        let today = local.date_naive();
        let local_hour = chrono::Timelike::hour(&local);
        let quiet = self.config.quiet_hours.contains_hour(local_hour);

        state.roll_daily_cost(&today.to_string());
        self.run_maintenance(&mut state, now_ms);

        // --- world snapshot ---
        let extras = self.deps.world_provider.extras(now_ms);
        let _ = self.deps.goals.import_changes();
        let world = WorldSnapshot {
            now_ms,
            today,
            local_hour,
            quiet,
            goals: self.deps.goals.list(&GoalFilter::default()),
            followups: state.pending_followups.clone(),
            crons: extras.crons,
            memory: extras.memory,
            memories: extras.memories,
            mcp: extras.mcp,
            error_spike: self.deps.analytics.detect_spike(now_ms),
            error_summary: Some(self.deps.analytics.summarize_for_agent(now_ms)),
            last_inbound_message_at: extras.last_inbound_message_at,
            bot_memory_modified_at: extras.bot_memory_modified_at,
            workflows: extras.workflows,
            recovery_patterns: extras.recovery_patterns,
            content_keywords: extras.content_keywords,
            api_calls_today: extras.api_calls_today,
            cost_tracking_enabled: self.config.cost_tracking_enabled,
            pattern_insights: extras.pattern_insights,
            learning_notes: extras.learning_notes,
            hypotheses: extras.hypotheses,
        };

        // --- collect, correlate, pick ---
        let mut signals = detect::collect_signals(&world, &mut state, &self.deps.modules);
        arbiter::correlate(&mut signals, &world);
        self.fire_direct_alerts(&signals).await;
        let sonnet_types = router::sonnet_types(&self.deps.modules);
        let picked = arbiter::pick(signals, &mut state, now_ms, &sonnet_types);
        self.record_event(
            &mut state,
            CycleEvent::new(names::CYCLE_SIGNALS, now_ms)
                .with_data(json!({"count": picked.picked.len(), "cooled_down": picked.cooled_down})),
        );

        // --- skip guards ---
        if state.consecutive_spawns >= self.config.backoff_threshold {
            info!(
                spawns = state.consecutive_spawns,
                "spawn backoff: skipping one cycle"
            );
            let spawns = state.consecutive_spawns;
            self.record_event(
                &mut state,
                CycleEvent::new(names::CYCLE_BACKOFF, now_ms).with_data(json!({"spawns": spawns})),
            );
            state.consecutive_spawns = 0;
            return self.finish_skip(state, now_ms, picked.picked.len(), quiet);
        }

        let kind = composer::decide_kind(
            picked.picked.len(),
            state.cycle_count,
            self.config.always_think_every,
        );
        if kind == CycleKind::Skip {
            self.record_event(&mut state, CycleEvent::new(names::CYCLE_SKIP, now_ms));
            return self.finish_skip(state, now_ms, picked.picked.len(), quiet);
        }

        // --- compose ---
        let mut tier = match kind {
            CycleKind::Reasoning => router::choose_tier(&picked.picked, &state),
            _ => Tier::Free,
        };
        if tier == Tier::Paid
            && self.config.cost_tracking_enabled
            && state.daily_cost >= self.config.daily_cost_limit
        {
            info!(
                daily_cost = state.daily_cost,
                limit = self.config.daily_cost_limit,
                "daily cost limit reached, holding to the free tier"
            );
            tier = Tier::Free;
        }
        if self
            .deps
            .router
            .maybe_reset_session(self.prior_cycle_errored.load(Ordering::SeqCst))
        {
            self.record_event(&mut state, CycleEvent::new(names::SESSION_RESET, now_ms));
        }
        let milestone_brief = if tier == Tier::Paid {
            self.deps
                .autocoder
                .pick_milestone(&world.goals)
                .map(|(goal, milestone)| {
                    self.deps.autocoder.build_milestone_brief(goal, milestone)
                })
        } else {
            None
        };
        let prompt = composer::compose(&ComposeInputs {
            kind,
            world: &world,
            picked: &picked.picked,
            state: &state,
            modules: &self.deps.modules,
            milestone_brief,
            lite: tier == Tier::Free,
        });

        // --- invoke ---
        let invocation = self
            .deps
            .router
            .invoke(&prompt, tier, self.config.llm_timeout)
            .await?;
        if invocation.used_paid {
            self.deps.router.session().note_cycle();
        }
        state.consecutive_spawns += 1;
        state.note_cost(invocation.cost_usd, invocation.used_paid);
        state.last_cycle_tokens = invocation.input_tokens + invocation.output_tokens;

        // --- parse and dispatch ---
        let parsed = parser::parse(&invocation.text);
        for warning in &parsed.warnings {
            warn!(%warning, "parser dropped a directive");
        }
        let report = self
            .deps
            .dispatcher
            .dispatch(
                parsed.directives,
                &DispatchContext {
                    world: &world,
                    picked: &picked.picked,
                    kind,
                    used_paid: invocation.used_paid,
                    model: invocation.model.clone(),
                    tool_log: &invocation.tool_log,
                    modules: &self.deps.modules,
                },
                &mut state,
            )
            .await;

        // --- audit trail ---
        let files = self.collect_file_diffs().await;
        state.last_cycle_file_touches = files.len() as u32;
        let mut diff = CycleDiff::new(state.cycle_count, now_ms, &invocation.model, invocation.cost_usd);
        diff.actions = report.actions.clone();
        diff.bash_commands = report.bash_commands.clone();
        diff.files = files;
        if let Err(e) = self.deps.diffs.write(&diff, &prompt, &invocation.text) {
            warn!(error = %e, "failed to write cycle diff");
        }

        if report.messages_sent > 0 {
            self.record_event(
                &mut state,
                CycleEvent::new(names::MESSAGE_SENT, now_ms)
                    .with_data(json!({"count": report.messages_sent})),
            );
        }
        if report.messages_suppressed > 0 {
            self.record_event(
                &mut state,
                CycleEvent::new(names::MESSAGE_SUPPRESSED, now_ms)
                    .with_data(json!({"count": report.messages_suppressed})),
            );
        }

        // --- next delay ---
        let critical_module_work = picked.picked.iter().any(|signal| {
            self.deps
                .modules
                .iter()
                .any(|m| m.critical_override(signal))
        });
        let productive = report.actions.len() >= 2 || report.goal_created;
        let next_delay = if let Some(minutes) = report.next_cycle_minutes {
            state.consecutive_recycles = 0;
            Duration::from_secs(u64::from(minutes) * 60)
        } else if productive && state.consecutive_recycles < self.config.max_consecutive_recycles {
            state.consecutive_recycles += 1;
            self.config.recycle_delay
        } else {
            state.consecutive_recycles = 0;
            if quiet && !critical_module_work {
                self.config.quiet_delay
            } else {
                self.config.loop_interval
            }
        };

        // --- persist and complete ---
        state.cycle_count += 1;
        state.last_cycle_at = now_ms;
        self.record_event(
            &mut state,
            CycleEvent::new(names::CYCLE_COMPLETE, now_ms).with_data(json!({
                "kind": kind.label(),
                "model": invocation.model,
                "cost": invocation.cost_usd,
                "actions": report.actions.len(),
            })),
        );
        self.persist(&state)?;

        Ok(CycleOutcome {
            kind,
            picked: picked.picked.len(),
            invoked_backend: true,
            next_delay,
            error: None,
        })
    }

    /// Common tail for skip cycles.
    fn finish_skip(
        &self,
        mut state: CycleState,
        now_ms: u64,
        picked: usize,
        quiet: bool,
    ) -> Result<CycleOutcome, CycleError> {
        state.cycle_count += 1;
        state.last_cycle_at = now_ms;
        state.consecutive_recycles = 0;
        self.persist(&state)?;
        let next_delay = if quiet {
            self.config.quiet_delay
        } else {
            self.config.loop_interval
        };
        Ok(CycleOutcome {
            kind: CycleKind::Skip,
            picked,
            invoked_backend: false,
            next_delay,
            error: None,
        })
    }

    /// Out-of-band alerts requested by detectors (error spike high,
    /// memory CRITICAL), independent of picking.
    async fn fire_direct_alerts(&self, signals: &[Signal]) {
        for signal in signals {
            if signal.data.get("alert").and_then(serde_json::Value::as_bool) != Some(true) {
                continue;
            }
            if let Err(e) = self
                .deps
                .notify
                .notify(&signal.signal_type, &signal.summary)
                .await
            {
                warn!(error = %e, "direct alert failed");
            }
        }
    }

    /// Low-frequency maintenance, gated on wall-clock stamps.
    fn run_maintenance(&self, state: &mut CycleState, now_ms: u64) {
        if now_ms.saturating_sub(state.last_weekly_rollup_at) >= WEEK_MS {
            state.last_weekly_rollup_at = now_ms;
            let week_total: f64 = state
                .daily_cost_history
                .iter()
                .rev()
                .take(7)
                .map(|d| d.cost_usd)
                .sum();
            info!(week_total, "weekly cost rollup");
            self.record_event(
                state,
                CycleEvent::new("agent:cost:weekly", now_ms)
                    .with_data(json!({"total_usd": week_total})),
            );
        }
        if now_ms.saturating_sub(state.last_index_sync_at) >= INDEX_SYNC_MS {
            state.last_index_sync_at = now_ms;
            if let Err(e) = self.deps.goals.import_changes() {
                warn!(error = %e, "goal index sync failed");
            }
        }
        if now_ms.saturating_sub(state.last_chronic_scan_at) >= DAY_MS {
            state.last_chronic_scan_at = now_ms;
            let summary = self.deps.analytics.summarize_for_agent(now_ms);
            info!(%summary, "chronic error scan");
            if let Err(e) = self.deps.diffs.prune_older_than(now_ms, DIFF_RETENTION_MS) {
                warn!(error = %e, "diff retention prune failed");
            }
        }
    }

    /// Per-file diffs for the audit record.
    async fn collect_file_diffs(&self) -> Vec<FileDiff> {
        let mut diffs = Vec::new();
        for path in self.deps.autocoder.modified_files().await {
            let diff = self.deps.autocoder.file_diff(&path).await;
            diffs.push(FileDiff { path, diff });
        }
        diffs
    }

    fn persist(&self, state: &CycleState) -> Result<(), CycleError> {
        self.deps.kv.put(CYCLE_STATE_KEY, state)?;
        let status = StatusSnapshot {
            cycle_count: state.cycle_count,
            last_cycle_at: state.last_cycle_at,
            daily_cost: state.daily_cost,
            pending_followups: state.pending_followups.len(),
            recent_events: self.events.lock().snapshot().to_vec(),
        };
        self.deps.kv.put("status", &status)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
