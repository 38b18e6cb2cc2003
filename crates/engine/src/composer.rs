//! Prompt composer.
//!
//! Builds one `<context>…</context>` block from labelled sections,
//! followed by instructions and the output-tag schema for the chosen
//! cycle kind. Free/local backends get a lighter rendition without the
//! tool-schema verbosity.

use crate::module::AgentModule;
use crate::world::WorldSnapshot;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use minder_core::{format_since, CycleState, GoalStatus, Signal};

/// Floor and ceiling for `<next_cycle_minutes>` hints.
pub const MIN_CYCLE_MINUTES: u32 = 5;
pub const MAX_CYCLE_MINUTES: u32 = 120;

/// What kind of cycle this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Signals present: reason about them.
    Reasoning,
    /// Nothing urgent; periodic open-ended reflection.
    Reflection,
    /// Nothing to do; exit early without invoking a backend.
    Skip,
}

impl CycleKind {
    pub fn label(&self) -> &'static str {
        match self {
            CycleKind::Reasoning => "reasoning",
            CycleKind::Reflection => "reflection",
            CycleKind::Skip => "skip",
        }
    }
}

/// Decide the cycle kind from the picked signals and the reflection
/// cadence.
pub fn decide_kind(signal_count: usize, cycle_count: u64, think_every: u64) -> CycleKind {
    if signal_count > 0 {
        CycleKind::Reasoning
    } else if think_every > 0 && cycle_count % think_every == 0 {
        CycleKind::Reflection
    } else {
        CycleKind::Skip
    }
}

/// Clamp a model-suggested cycle length into the allowed window.
pub fn clamp_cycle_minutes(minutes: u32) -> u32 {
    minutes.clamp(MIN_CYCLE_MINUTES, MAX_CYCLE_MINUTES)
}

/// Inputs that vary per cycle beyond the world snapshot.
pub struct ComposeInputs<'a> {
    pub kind: CycleKind,
    pub world: &'a WorldSnapshot,
    pub picked: &'a [Signal],
    pub state: &'a CycleState,
    pub modules: &'a [Box<dyn AgentModule>],
    /// Auto-coder brief for paid cycles with a milestone available.
    pub milestone_brief: Option<String>,
    /// Lighter prompt for free/local backends.
    pub lite: bool,
}

/// Compose the full prompt text.
pub fn compose(inputs: &ComposeInputs<'_>) -> String {
    fn push(sections: &mut IndexMap<String, String>, label: &str, body: String) {
        if !body.is_empty() {
            sections.insert(label.to_string(), body);
        }
    }
    let mut sections: IndexMap<String, String> = IndexMap::new();

    push(&mut sections, "Time", time_section(inputs.world));
    if !inputs.picked.is_empty() {
        push(&mut sections, "Signals", signals_section(inputs.picked));
    }
    push(&mut sections, "Active goals", goals_section(inputs.world));
    push(
        &mut sections,
        "Patterns (30d)",
        inputs.world.pattern_insights.join("\n"),
    );
    if inputs
        .picked
        .iter()
        .any(|s| s.signal_type == minder_core::signal::types::ERROR_SPIKE)
    {
        if let Some(summary) = &inputs.world.error_summary {
            push(&mut sections, "Error analysis", summary.clone());
        }
    }
    for module in inputs.modules {
        if let Some((label, body)) = module.context_block(inputs.world) {
            push(&mut sections, &label, body);
        }
    }
    push(
        &mut sections,
        "Recent actions",
        actions_section(inputs.state, inputs.world.now_ms),
    );
    push(
        &mut sections,
        "Briefs",
        briefs_section(inputs.picked, inputs.modules, &inputs.milestone_brief),
    );
    push(
        &mut sections,
        "Learning",
        inputs.world.learning_notes.join("\n"),
    );
    push(&mut sections, "Hypotheses", hypotheses_section(inputs.world));

    let mut prompt = String::from("<context>\n");
    for (label, body) in &sections {
        prompt.push_str(&format!("## {label}\n{body}\n\n"));
    }
    prompt.push_str("</context>\n\n");
    prompt.push_str(&instructions(inputs.kind, inputs.lite));
    prompt.push_str(&tag_schema(inputs.lite));
    prompt
}

fn time_section(world: &WorldSnapshot) -> String {
    let wall = DateTime::<Utc>::from_timestamp_millis(world.now_ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let quiet_marker = if world.quiet {
        " - QUIET HOURS (do not message unless critical)"
    } else {
        ""
    };
    format!("{wall}, local hour {}{quiet_marker}", world.local_hour)
}

fn signals_section(picked: &[Signal]) -> String {
    picked
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. [{}] {}", i + 1, s.urgency, s.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

fn goals_section(world: &WorldSnapshot) -> String {
    let mut active: Vec<_> = world
        .goals
        .iter()
        .filter(|g| {
            matches!(
                g.status,
                GoalStatus::Active | GoalStatus::InProgress | GoalStatus::Blocked
            )
        })
        .collect();
    active.sort_by(|a, b| b.priority.cmp(&a.priority));
    active
        .iter()
        .map(|g| {
            format!(
                "{} [{} {} {}%] {}",
                g.id,
                g.priority,
                g.status,
                g.progress,
                g.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn actions_section(state: &CycleState, now_ms: u64) -> String {
    state
        .recent_actions_within(now_ms)
        .iter()
        .map(|a| format!("{} ago: {}", format_since(now_ms, a.ts), a.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn briefs_section(
    picked: &[Signal],
    modules: &[Box<dyn AgentModule>],
    milestone_brief: &Option<String>,
) -> String {
    let mut briefs: Vec<String> = Vec::new();
    for signal in picked {
        for module in modules {
            if let Some(brief) = module.signal_brief(signal) {
                briefs.push(brief);
            }
        }
    }
    if let Some(brief) = milestone_brief {
        briefs.push(brief.clone());
    }
    briefs.join("\n\n")
}

fn hypotheses_section(world: &WorldSnapshot) -> String {
    world
        .hypotheses
        .iter()
        .map(|h| {
            let status = if h.open { "open" } else { "concluded" };
            format!("[{status}] {}: {}", h.id, h.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn instructions(kind: CycleKind, lite: bool) -> String {
    let base = match kind {
        CycleKind::Reasoning => {
            "Review the signals above and act on what matters. Skip anything you already \
             handled in a previous cycle. Every mutation needs an <action_taken> entry."
        }
        CycleKind::Reflection => {
            "No urgent signals. Reflect: is there one goal worth proposing, one memory worth \
             ingesting, or nothing at all? At most one mutating directive this cycle."
        }
        CycleKind::Skip => "",
    };
    if lite {
        format!("{base}\nBe brief. Use only the tags listed below.\n\n")
    } else {
        format!("{base}\n\n")
    }
}

fn tag_schema(lite: bool) -> String {
    let mut schema = String::from(
        "Available response tags:\n\
         <wa_message>text</wa_message> - message the user\n\
         <followup goal=\"id\">topic</followup> - defer work\n\
         <next_cycle_minutes>N</next_cycle_minutes> - schedule hint (5-120)\n\
         <action_taken>text</action_taken> - audit what you did\n\
         <goal_create title=\"t\">description</goal_create>\n\
         <goal_update id=\"g\" status=\"s\" progress=\"p\">note</goal_update>\n\
         <milestone_complete goal=\"g\" milestone=\"m\">evidence</milestone_complete>\n\
         <goal_propose title=\"t\" rationale=\"r\">milestone per line</goal_propose>\n\
         <chain_plan>JSON or text</chain_plan> - start a workflow\n\
         <lesson_learned>text</lesson_learned>\n\
         <capability_gap topic=\"t\">text</capability_gap>\n\
         <hypothesis>text</hypothesis> / <evidence hid=\"h\">text</evidence> / \
         <conclude hid=\"h\">text</conclude>\n",
    );
    if !lite {
        schema.push_str(
            "<tool_call name=\"tool\">{JSON params}</tool_call> - invoke a tool; results \
             return as <tool_result> next turn\n\
             <experiment_create>{JSON}</experiment_create>\n\
             <skill_generate name=\"n\" category=\"c\">description</skill_generate>\n",
        );
    }
    schema
}

#[cfg(test)]
#[path = "composer_tests.rs"]
mod tests;
