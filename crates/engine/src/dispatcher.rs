//! Effect dispatcher: executes parsed directives in a fixed order.
//!
//! Order matters and is fixed: routing decisions, outbound messages,
//! followups, action audit, goal creates, proposals, updates, milestone
//! completions, skill generations, tool calls (paid cycles only), chain
//! plans, journal entries, then the violation audit.

use crate::composer::{clamp_cycle_minutes, CycleKind};
use crate::gates::{ChainRunner, GateEvaluator, LearningStore, TrustEvaluator};
use crate::module::AgentModule;
use crate::router::ToolLogEntry;
use crate::world::WorldSnapshot;
use minder_adapters::{AutoCoder, MessageCategory, Messaging, Notify, ToolBridge};
use minder_core::{CycleState, Directive, Followup, GoalSource, Signal};
use minder_storage::{AddGoalOptions, GoalStore, GoalUpdateFields};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outbound sends race this timeout so a wedged channel adapter cannot
/// hang the cycle.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Live agent-created goals allowed at once.
const MAX_AGENT_GOALS: usize = 5;
/// Goal creations allowed per cycle.
const MAX_GOAL_CREATES_PER_CYCLE: usize = 1;

/// Gate thresholds: below `min_score` asks the user, below this
/// proposes, at or above executes.
const GATE_EXECUTE_SCORE: u8 = 7;

/// Sonnet cooldown bounds (cycles).
const SONNET_COOLDOWN_MIN: u64 = 2;
const SONNET_COOLDOWN_MAX: u64 = 12;

/// Claim-flavoured words used by the hallucination audit to spot
/// messages describing work that never happened.
const CLAIM_WORDS: &[&str] = &["completed", "done", "fixed", "created", "deployed", "committed"];

/// Per-cycle dispatch context.
pub struct DispatchContext<'a> {
    pub world: &'a WorldSnapshot,
    pub picked: &'a [Signal],
    pub kind: CycleKind,
    pub used_paid: bool,
    pub model: String,
    pub tool_log: &'a [ToolLogEntry],
    pub modules: &'a [Box<dyn AgentModule>],
}

/// What one dispatch pass did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub actions: Vec<String>,
    pub bash_commands: Vec<String>,
    pub messages_sent: usize,
    pub messages_suppressed: usize,
    pub next_cycle_minutes: Option<u32>,
    pub goal_created: bool,
    pub mutations: usize,
    pub violations: Vec<String>,
    pub stripped_claims: usize,
}

/// The dispatcher and its wired collaborators.
pub struct Dispatcher {
    goals: Arc<GoalStore>,
    messaging: Arc<dyn Messaging>,
    notify: Arc<dyn Notify>,
    tools: Arc<dyn ToolBridge>,
    autocoder: Arc<dyn AutoCoder>,
    gate: Arc<dyn GateEvaluator>,
    trust: Arc<dyn TrustEvaluator>,
    learning: Arc<dyn LearningStore>,
    chains: Arc<dyn ChainRunner>,
    gate_enabled: bool,
    gate_min_score: u8,
    max_followups: usize,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        goals: Arc<GoalStore>,
        messaging: Arc<dyn Messaging>,
        notify: Arc<dyn Notify>,
        tools: Arc<dyn ToolBridge>,
        autocoder: Arc<dyn AutoCoder>,
        gate: Arc<dyn GateEvaluator>,
        trust: Arc<dyn TrustEvaluator>,
        learning: Arc<dyn LearningStore>,
        chains: Arc<dyn ChainRunner>,
        gate_enabled: bool,
        gate_min_score: u8,
        max_followups: usize,
    ) -> Self {
        Self {
            goals,
            messaging,
            notify,
            tools,
            autocoder,
            gate,
            trust,
            learning,
            chains,
            gate_enabled,
            gate_min_score,
            max_followups,
        }
    }

    /// Execute all directives against the collaborators, in order.
    pub async fn dispatch(
        &self,
        directives: Vec<Directive>,
        ctx: &DispatchContext<'_>,
        state: &mut CycleState,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let now_ms = ctx.world.now_ms;

        // --- routing decisions ---
        let category = infer_category(ctx.picked, ctx.modules);
        let critical_override = ctx.picked.iter().any(|signal| {
            ctx.modules
                .iter()
                .any(|module| module.critical_override(signal))
        });
        let suppress_messages = ctx.world.quiet && !critical_override;

        let directives = self.reflection_filter(directives, ctx.kind);
        let directives = self.hallucination_audit(directives, ctx, &mut report);

        if ctx
            .picked
            .iter()
            .any(|s| s.signal_type == minder_core::signal::types::COST_DOWNGRADE_HINT)
        {
            self.impose_sonnet_cooldown(state, &mut report);
        }

        // --- outbound messages ---
        for directive in &directives {
            let Directive::Message { text } = directive else {
                continue;
            };
            if suppress_messages {
                debug!("quiet hours, suppressing outbound message");
                report.messages_suppressed += 1;
                continue;
            }
            if self.send_raced(category, text).await {
                report.messages_sent += 1;
            } else {
                report.messages_suppressed += 1;
            }
        }

        // --- followup enqueue ---
        for directive in &directives {
            let Directive::Followup { topic, goal_id } = directive else {
                continue;
            };
            let accepted = state.push_followup(
                Followup {
                    topic: topic.clone(),
                    created_at: now_ms,
                    goal_id: goal_id.clone(),
                },
                self.max_followups,
            );
            if !accepted {
                warn!(%topic, "followup queue full or duplicate, dropping");
            }
        }

        // --- action audit ---
        for directive in &directives {
            let Directive::ActionTaken { text } = directive else {
                continue;
            };
            state.push_action(now_ms, state.cycle_count, text.clone());
            report.actions.push(text.clone());
        }

        // --- next-cycle override (recorded; supervisor applies it) ---
        for directive in &directives {
            if let Directive::NextCycleMinutes { minutes } = directive {
                report.next_cycle_minutes = Some(clamp_cycle_minutes(*minutes));
            }
        }

        // --- goal creates ---
        let mut creates_this_cycle = 0;
        for directive in &directives {
            let Directive::GoalCreate { title, description } = directive else {
                continue;
            };
            if creates_this_cycle >= MAX_GOAL_CREATES_PER_CYCLE {
                warn!(%title, "goal create cap reached this cycle");
                continue;
            }
            if self.goals.count_agent_active() >= MAX_AGENT_GOALS {
                warn!(%title, "agent goal cap reached, dropping create");
                continue;
            }
            match self.goals.add(
                title,
                AddGoalOptions {
                    description: description.clone(),
                    source: GoalSource::Agent,
                    ..Default::default()
                },
                now_ms,
            ) {
                Ok(goal) => {
                    creates_this_cycle += 1;
                    report.goal_created = true;
                    report.mutations += 1;
                    report.actions.push(format!("created goal {}", goal.id));
                }
                Err(e) => warn!(error = %e, "goal create failed"),
            }
        }

        // --- goal proposals ---
        for directive in &directives {
            let Directive::GoalPropose {
                title,
                rationale,
                milestones,
            } = directive
            else {
                continue;
            };
            match self.goals.propose(
                title,
                AddGoalOptions {
                    description: rationale.clone(),
                    milestones: milestones.clone(),
                    source: GoalSource::Agent,
                    ..Default::default()
                },
                now_ms,
            ) {
                Ok(goal) => {
                    report.mutations += 1;
                    report.actions.push(format!("proposed goal {}", goal.id));
                }
                Err(e) => warn!(error = %e, "goal propose failed"),
            }
        }

        // --- goal updates ---
        for directive in &directives {
            let Directive::GoalUpdate {
                id,
                status,
                progress,
                note,
            } = directive
            else {
                continue;
            };
            let fields = GoalUpdateFields {
                status: *status,
                progress: *progress,
                note: Some(note.clone()),
                ..Default::default()
            };
            match self.goals.update(id.as_str(), fields, now_ms) {
                Ok(Some(goal)) => {
                    report.mutations += 1;
                    report
                        .actions
                        .push(format!("updated goal {} to {}", goal.id, goal.status));
                }
                Ok(None) => {
                    warn!(goal = %id, "goal update rejected (unknown goal or illegal transition)");
                }
                Err(e) => warn!(error = %e, "goal update failed"),
            }
        }

        // --- milestone completions ---
        for directive in &directives {
            let Directive::MilestoneComplete {
                goal_id,
                milestone_id,
                evidence,
            } = directive
            else {
                continue;
            };
            match self.goals.complete_milestone(
                goal_id.as_str(),
                milestone_id.as_str(),
                evidence,
                &ctx.model,
                now_ms,
            ) {
                Ok(Some(completion)) => {
                    report.mutations += 1;
                    report.actions.push(format!(
                        "completed milestone {milestone_id} of {goal_id}"
                    ));
                    if completion.goal_completed {
                        report
                            .actions
                            .push(format!("goal {goal_id} auto-completed"));
                    }
                    if ctx.used_paid {
                        self.autocoder_hook(&completion.goal, milestone_id.as_str(), evidence, ctx, &mut report)
                            .await;
                    }
                }
                Ok(None) => warn!(goal = %goal_id, milestone = %milestone_id, "unknown milestone"),
                Err(e) => warn!(error = %e, "milestone completion failed"),
            }
        }

        // --- skill generations ---
        for directive in &directives {
            let Directive::SkillGenerate {
                name,
                category: skill_category,
                description,
            } = directive
            else {
                continue;
            };
            self.learning
                .record_skill(name, skill_category, description, now_ms);
            report.mutations += 1;
            report.actions.push(format!("generated skill {name}"));
        }

        // --- tool calls (paid cycles only; free ran in the router loop) ---
        if ctx.used_paid {
            for directive in &directives {
                let Directive::ToolCall { name, params } = directive else {
                    continue;
                };
                if !self.gate_permits(directive, ctx, category, &mut report).await {
                    continue;
                }
                let value = params
                    .as_json()
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({"_malformed": true}));
                let result = self.tools.execute_tool(name, &value).await;
                report.mutations += 1;
                if name == "shell" || name == "bash" {
                    if let Some(cmd) = value.get("cmd").or_else(|| value.get("command")) {
                        if let Some(cmd) = cmd.as_str() {
                            report.bash_commands.push(cmd.to_string());
                        }
                    }
                }
                if result.success {
                    report.actions.push(format!("ran tool {name}"));
                } else {
                    warn!(tool = %name, error = %result.output, "tool call failed");
                }
            }
        }

        // --- chain plans ---
        for directive in &directives {
            let Directive::ChainPlan { plan } = directive else {
                continue;
            };
            if !self.gate_permits(directive, ctx, category, &mut report).await {
                continue;
            }
            match self.chains.start_chain(plan).await {
                Ok(id) => {
                    report.mutations += 1;
                    report.actions.push(format!("started workflow {id}"));
                }
                Err(e) => warn!(error = %e, "chain start failed"),
            }
        }

        // --- journal entries ---
        for directive in &directives {
            match directive {
                Directive::LessonLearned { text } => self.learning.record_lesson(text, now_ms),
                Directive::Hypothesis { text } => self.learning.record_hypothesis(text, now_ms),
                Directive::Evidence {
                    hypothesis_id,
                    text,
                } => self.learning.record_evidence(hypothesis_id, text, now_ms),
                Directive::Conclude {
                    hypothesis_id,
                    text,
                } => self.learning.conclude(hypothesis_id, text, now_ms),
                _ => {}
            }
        }

        // --- gap and experiment entries ---
        for directive in &directives {
            match directive {
                Directive::CapabilityGap { topic, text } => {
                    self.learning.record_gap(topic, text, now_ms)
                }
                Directive::ExperimentCreate { spec } => {
                    let value = spec
                        .as_json()
                        .cloned()
                        .unwrap_or_else(|| serde_json::json!({"_malformed": true}));
                    self.learning.record_experiment(&value, now_ms);
                    report.mutations += 1;
                }
                _ => {}
            }
        }

        // --- violation audit ---
        for module in ctx.modules {
            let violations = module.audit_violations(&directives, ctx.world);
            for violation in violations {
                warn!(module = module.name(), %violation, "limit violation in reply");
                let _ = self
                    .notify
                    .notify("limit violation", &violation)
                    .await;
                report.violations.push(violation);
            }
        }

        report
    }

    /// Reflection cycles permit at most one mutating directive.
    fn reflection_filter(&self, directives: Vec<Directive>, kind: CycleKind) -> Vec<Directive> {
        if kind != CycleKind::Reflection {
            return directives;
        }
        let mut mutations = 0;
        directives
            .into_iter()
            .filter(|d| {
                if !d.is_mutating() {
                    return true;
                }
                mutations += 1;
                if mutations > 1 {
                    debug!(directive = d.name(), "dropping extra mutation in reflection cycle");
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    /// Free-backend cycles that claim actions without any mutating tool
    /// call get their claims stripped and claim-flavoured messages
    /// suppressed.
    fn hallucination_audit(
        &self,
        directives: Vec<Directive>,
        ctx: &DispatchContext<'_>,
        report: &mut DispatchReport,
    ) -> Vec<Directive> {
        if ctx.used_paid {
            return directives;
        }
        let claimed = directives
            .iter()
            .any(|d| matches!(d, Directive::ActionTaken { .. }));
        if !claimed {
            return directives;
        }
        let mutated = ctx.tool_log.iter().any(|t| tool_is_mutating(&t.name))
            || directives.iter().any(Directive::is_mutating);
        if mutated {
            return directives;
        }

        warn!("free cycle claimed actions without mutations, stripping claims");
        directives
            .into_iter()
            .filter(|d| match d {
                Directive::ActionTaken { .. } => {
                    report.stripped_claims += 1;
                    false
                }
                Directive::Message { text } => {
                    let lower = text.to_lowercase();
                    let claimy = CLAIM_WORDS.iter().any(|w| lower.contains(w));
                    if claimy {
                        report.messages_suppressed += 1;
                    }
                    !claimy
                }
                _ => true,
            })
            .collect()
    }

    /// Consult the confidence gate for a risky directive. Returns true
    /// when execution may proceed.
    async fn gate_permits(
        &self,
        directive: &Directive,
        ctx: &DispatchContext<'_>,
        category: MessageCategory,
        report: &mut DispatchReport,
    ) -> bool {
        if !self.gate_enabled {
            return true;
        }
        let score = self.gate.score(directive, ctx.world);
        if score < self.gate_min_score {
            let text = format!(
                "I want to run `{}` but my confidence is low ({score}/10). Reply to confirm.",
                directive.name()
            );
            if self.send_raced(category, &text).await {
                report.messages_sent += 1;
            }
            return false;
        }
        if score < GATE_EXECUTE_SCORE || !self.trust.allows(directive, score) {
            let text = format!(
                "Proposing `{}` (confidence {score}/10); say the word and I'll run it.",
                directive.name()
            );
            if self.send_raced(category, &text).await {
                report.messages_sent += 1;
            }
            return false;
        }
        true
    }

    /// Run tests, then commit and notify, for milestone work on paid
    /// cycles.
    async fn autocoder_hook(
        &self,
        goal: &minder_core::Goal,
        milestone_id: &str,
        evidence: &str,
        ctx: &DispatchContext<'_>,
        report: &mut DispatchReport,
    ) {
        let Some(milestone) = goal.milestones.iter().find(|m| m.id == *milestone_id) else {
            return;
        };
        let run = match self.autocoder.run_tests().await {
            Ok(run) => run,
            Err(e) => {
                warn!(error = %e, "auto-coder test run failed to start");
                return;
            }
        };
        if !run.passed {
            let skip = run.output.chars().count().saturating_sub(400);
            let tail: String = run.output.chars().skip(skip).collect();
            let text = format!(
                "Milestone \"{}\" claimed done but the test suite failed; not committing.\n{}",
                milestone.title, tail
            );
            let _ = self.notify.notify("auto-coder: tests failed", &text).await;
            report.actions.push("auto-coder: tests failed, no commit".into());
            return;
        }
        match self.autocoder.commit_and_report(goal, milestone, evidence).await {
            Ok(commit) if commit.committed => {
                info!(files = commit.files.len(), "auto-coder committed milestone work");
                report.actions.push(format!(
                    "auto-coder committed {} files for {}",
                    commit.files.len(),
                    milestone_id
                ));
                if !(ctx.world.quiet) {
                    let text = format!(
                        "Milestone \"{}\" done, tests green, {} files committed.",
                        milestone.title,
                        commit.files.len()
                    );
                    if self.send_raced(MessageCategory::Daily, &text).await {
                        report.messages_sent += 1;
                    }
                }
            }
            Ok(_) => {
                report.actions.push("auto-coder: nothing to commit".into());
            }
            Err(e) => {
                warn!(error = %e, "auto-coder commit failed");
                let _ = self
                    .notify
                    .notify("auto-coder: commit failed", &e.to_string())
                    .await;
            }
        }
    }

    /// Cost spike: self-impose a paid-tier cooldown proportional to the
    /// overshoot, clamped to [2, 12] cycles.
    fn impose_sonnet_cooldown(&self, state: &mut CycleState, report: &mut DispatchReport) {
        let avg = state.rolling_avg_daily_cost();
        let ratio = if avg > 0.0 {
            (state.daily_cost / avg).ceil() as u64
        } else {
            1
        };
        let cooldown = (2 * ratio).clamp(SONNET_COOLDOWN_MIN, SONNET_COOLDOWN_MAX);
        state.sonnet_cooldown_until = state.cycle_count + cooldown;
        info!(
            until = state.sonnet_cooldown_until,
            cooldown, "sonnet cooldown imposed after cost spike"
        );
        report
            .actions
            .push(format!("imposed sonnet cooldown for {cooldown} cycles"));
    }

    async fn send_raced(&self, category: MessageCategory, text: &str) -> bool {
        match tokio::time::timeout(SEND_TIMEOUT, self.messaging.send_to_group(category, text))
            .await
        {
            Ok(sent) => sent,
            Err(_) => {
                warn!(category = %category, "message send timed out");
                false
            }
        }
    }
}

/// Route by category: the first module owning a picked signal wins,
/// otherwise `daily`.
pub fn infer_category(picked: &[Signal], modules: &[Box<dyn AgentModule>]) -> MessageCategory {
    for signal in picked {
        for module in modules {
            if module.owns_signal(&signal.signal_type) {
                return module.message_category();
            }
        }
    }
    MessageCategory::Daily
}

/// Read-shaped tool names do not count as mutations.
fn tool_is_mutating(name: &str) -> bool {
    const READ_PREFIXES: &[&str] = &["read", "list", "get", "search", "query", "fetch"];
    !READ_PREFIXES.iter().any(|p| name.starts_with(p))
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
