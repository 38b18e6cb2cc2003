//! Parsed model directives
//!
//! One variant per output tag the model may emit. The parser (engine)
//! produces these; `to_tag` renders the canonical form, which re-parses
//! to an equal value.

use crate::goal::{GoalId, GoalStatus, MilestoneId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tag body that is usually JSON.
///
/// `Text` is for tags that legitimately accept free-form bodies
/// (`chain_plan`). `Malformed` carries the raw body of a failed JSON
/// parse so tools can surface a descriptive error instead of raising,
/// and so canonical rendering is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonBody {
    Json(Value),
    Malformed { raw: String },
    Text(String),
}

impl JsonBody {
    pub fn is_malformed(&self) -> bool {
        matches!(self, JsonBody::Malformed { .. })
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            JsonBody::Json(v) => Some(v),
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            JsonBody::Json(v) => v.to_string(),
            JsonBody::Malformed { raw } => raw.clone(),
            JsonBody::Text(text) => text.clone(),
        }
    }
}

/// One side-effect extracted from the model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum Directive {
    /// Queue an outbound message (`<wa_message>`).
    Message { text: String },
    /// Enqueue deferred work (`<followup goal="…">`).
    Followup {
        topic: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        goal_id: Option<GoalId>,
    },
    /// Override the next cycle delay (`<next_cycle_minutes>`).
    NextCycleMinutes { minutes: u32 },
    /// Audit entry; required companion for any mutation (`<action_taken>`).
    ActionTaken { text: String },
    /// Create a goal (`<goal_create title="…">`).
    GoalCreate { title: String, description: String },
    /// Transition and/or progress a goal (`<goal_update id status? progress?>`).
    GoalUpdate {
        id: GoalId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<GoalStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<u8>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        note: String,
    },
    /// Mark a milestone done (`<milestone_complete goal milestone>`).
    MilestoneComplete {
        goal_id: GoalId,
        milestone_id: MilestoneId,
        evidence: String,
    },
    /// User-approval-gated goal (`<goal_propose title rationale>`).
    GoalPropose {
        title: String,
        rationale: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        milestones: Vec<String>,
    },
    /// Tool invocation (`<tool_call name="…">`), handled in the router loop.
    ToolCall { name: String, params: JsonBody },
    /// Start a workflow (`<chain_plan>`).
    ChainPlan { plan: JsonBody },
    /// Learning-journal entry (`<lesson_learned>`).
    LessonLearned { text: String },
    /// Gap-tracker entry (`<capability_gap topic="…">`).
    CapabilityGap { topic: String, text: String },
    /// Start an experiment (`<experiment_create>`).
    ExperimentCreate { spec: JsonBody },
    /// Open a hypothesis (`<hypothesis>`).
    Hypothesis { text: String },
    /// Attach evidence to a hypothesis (`<evidence hid="…">`).
    Evidence { hypothesis_id: String, text: String },
    /// Conclude a hypothesis (`<conclude hid="…">`).
    Conclude { hypothesis_id: String, text: String },
    /// Generate a new skill module (`<skill_generate name category>`).
    SkillGenerate {
        name: String,
        category: String,
        description: String,
    },
}

/// Escape `&` and `"` for attribute values.
fn attr_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

/// Reverse of [`attr_escape`]; used by the parser.
pub fn attr_unescape(s: &str) -> String {
    s.replace("&quot;", "\"").replace("&amp;", "&")
}

impl Directive {
    /// Short name for logging and audit records.
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Message { .. } => "wa_message",
            Directive::Followup { .. } => "followup",
            Directive::NextCycleMinutes { .. } => "next_cycle_minutes",
            Directive::ActionTaken { .. } => "action_taken",
            Directive::GoalCreate { .. } => "goal_create",
            Directive::GoalUpdate { .. } => "goal_update",
            Directive::MilestoneComplete { .. } => "milestone_complete",
            Directive::GoalPropose { .. } => "goal_propose",
            Directive::ToolCall { .. } => "tool_call",
            Directive::ChainPlan { .. } => "chain_plan",
            Directive::LessonLearned { .. } => "lesson_learned",
            Directive::CapabilityGap { .. } => "capability_gap",
            Directive::ExperimentCreate { .. } => "experiment_create",
            Directive::Hypothesis { .. } => "hypothesis",
            Directive::Evidence { .. } => "evidence",
            Directive::Conclude { .. } => "conclude",
            Directive::SkillGenerate { .. } => "skill_generate",
        }
    }

    /// Whether this directive mutates state (used by the hallucination
    /// audit and the "reflection permits one mutation" rule).
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Directive::Message { .. }
                | Directive::NextCycleMinutes { .. }
                | Directive::ActionTaken { .. }
                | Directive::Hypothesis { .. }
                | Directive::Evidence { .. }
                | Directive::Conclude { .. }
                | Directive::LessonLearned { .. }
                | Directive::CapabilityGap { .. }
        )
    }

    /// Render the canonical tag form. Attributes appear in a fixed
    /// order; parsing the result yields an equal directive.
    pub fn to_tag(&self) -> String {
        match self {
            Directive::Message { text } => format!("<wa_message>{text}</wa_message>"),
            Directive::Followup { topic, goal_id } => match goal_id {
                Some(id) => format!(
                    "<followup goal=\"{}\">{topic}</followup>",
                    attr_escape(id.as_str())
                ),
                None => format!("<followup>{topic}</followup>"),
            },
            Directive::NextCycleMinutes { minutes } => {
                format!("<next_cycle_minutes>{minutes}</next_cycle_minutes>")
            }
            Directive::ActionTaken { text } => format!("<action_taken>{text}</action_taken>"),
            Directive::GoalCreate { title, description } => format!(
                "<goal_create title=\"{}\">{description}</goal_create>",
                attr_escape(title)
            ),
            Directive::GoalUpdate {
                id,
                status,
                progress,
                note,
            } => {
                let mut attrs = format!(" id=\"{}\"", attr_escape(id.as_str()));
                if let Some(status) = status {
                    attrs.push_str(&format!(" status=\"{status}\""));
                }
                if let Some(progress) = progress {
                    attrs.push_str(&format!(" progress=\"{progress}\""));
                }
                format!("<goal_update{attrs}>{note}</goal_update>")
            }
            Directive::MilestoneComplete {
                goal_id,
                milestone_id,
                evidence,
            } => format!(
                "<milestone_complete goal=\"{}\" milestone=\"{}\">{evidence}</milestone_complete>",
                attr_escape(goal_id.as_str()),
                attr_escape(milestone_id.as_str())
            ),
            Directive::GoalPropose {
                title,
                rationale,
                milestones,
            } => format!(
                "<goal_propose title=\"{}\" rationale=\"{}\">{}</goal_propose>",
                attr_escape(title),
                attr_escape(rationale),
                milestones.join("\n")
            ),
            Directive::ToolCall { name, params } => format!(
                "<tool_call name=\"{}\">{}</tool_call>",
                attr_escape(name),
                params.render()
            ),
            Directive::ChainPlan { plan } => format!("<chain_plan>{}</chain_plan>", plan.render()),
            Directive::LessonLearned { text } => {
                format!("<lesson_learned>{text}</lesson_learned>")
            }
            Directive::CapabilityGap { topic, text } => format!(
                "<capability_gap topic=\"{}\">{text}</capability_gap>",
                attr_escape(topic)
            ),
            Directive::ExperimentCreate { spec } => {
                format!("<experiment_create>{}</experiment_create>", spec.render())
            }
            Directive::Hypothesis { text } => format!("<hypothesis>{text}</hypothesis>"),
            Directive::Evidence {
                hypothesis_id,
                text,
            } => format!(
                "<evidence hid=\"{}\">{text}</evidence>",
                attr_escape(hypothesis_id)
            ),
            Directive::Conclude {
                hypothesis_id,
                text,
            } => format!(
                "<conclude hid=\"{}\">{text}</conclude>",
                attr_escape(hypothesis_id)
            ),
            Directive::SkillGenerate {
                name,
                category,
                description,
            } => format!(
                "<skill_generate name=\"{}\" category=\"{}\">{description}</skill_generate>",
                attr_escape(name),
                attr_escape(category)
            ),
        }
    }
}

/// Render a directive list back to canonical text, one tag per line.
pub fn to_canonical(directives: &[Directive]) -> String {
    let mut out = String::new();
    for d in directives {
        out.push_str(&d.to_tag());
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[path = "directive_tests.rs"]
mod tests;
