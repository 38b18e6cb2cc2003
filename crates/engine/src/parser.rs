//! Response parser: extracts tagged directives from free-form model
//! text.
//!
//! Contracts: unknown or malformed tags are ignored; repeated tags
//! accumulate in document order; attributes may appear in any order; a
//! missing required attribute drops that directive with a warning.
//! JSON bodies are parsed strictly first, then with lenient repair;
//! irreparable bodies carry a malformed marker instead of raising.

use minder_core::{attr_unescape, Directive, GoalStatus, JsonBody};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Tags the parser understands, in no particular order.
const KNOWN_TAGS: &[&str] = &[
    "wa_message",
    "followup",
    "next_cycle_minutes",
    "action_taken",
    "goal_create",
    "goal_update",
    "milestone_complete",
    "goal_propose",
    "tool_call",
    "chain_plan",
    "lesson_learned",
    "capability_gap",
    "experiment_create",
    "hypothesis",
    "evidence",
    "conclude",
    "skill_generate",
];

/// Result of parsing one reply.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub directives: Vec<Directive>,
    /// One entry per dropped or repaired tag.
    pub warnings: Vec<String>,
}

/// One raw tag occurrence before typing.
#[derive(Debug)]
struct RawTag {
    name: String,
    attrs: HashMap<String, String>,
    body: String,
}

/// Extract all directives from a model reply.
pub fn parse(text: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut cursor = 0;
    while let Some(open) = text[cursor..].find('<') {
        let start = cursor + open;
        match scan_tag(text, start) {
            Some((raw, end)) => {
                cursor = end;
                match typed(&raw) {
                    Ok(directive) => outcome.directives.push(directive),
                    Err(reason) => {
                        debug!(tag = %raw.name, %reason, "dropping directive");
                        outcome.warnings.push(format!("{}: {}", raw.name, reason));
                    }
                }
            }
            None => cursor = start + 1,
        }
    }
    outcome
}

/// Scan one known tag starting at `start` (which points at `<`).
/// Returns the raw tag and the index just past its closing tag.
fn scan_tag(text: &str, start: usize) -> Option<(RawTag, usize)> {
    let after_open = &text[start + 1..];
    let name: String = after_open
        .chars()
        .take_while(|c| c.is_ascii_lowercase() || *c == '_')
        .collect();
    if !KNOWN_TAGS.contains(&name.as_str()) {
        return None;
    }
    let rest = &after_open[name.len()..];
    // Attribute region runs to the first unquoted '>'
    let mut attrs_end = None;
    let mut in_quotes = false;
    for (i, c) in rest.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '>' if !in_quotes => {
                attrs_end = Some(i);
                break;
            }
            '<' if !in_quotes => return None,
            _ => {}
        }
    }
    let attrs_end = attrs_end?;
    let attrs = parse_attrs(&rest[..attrs_end]);

    let body_start = start + 1 + name.len() + attrs_end + 1;
    let closing = format!("</{name}>");
    let close_at = text[body_start..].find(&closing)?;
    let body = text[body_start..body_start + close_at].to_string();
    Some((
        RawTag { name, attrs, body },
        body_start + close_at + closing.len(),
    ))
}

/// `key="value"` pairs, any order, ignoring stray tokens.
fn parse_attrs(region: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let bytes = region.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        // Skip to the next identifier
        while i < bytes.len() && !bytes[i].is_ascii_alphabetic() && bytes[i] != b'_' {
            i += 1;
        }
        let key_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            i += 1;
        }
        if key_start == i {
            break;
        }
        let key = &region[key_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'"' {
            continue;
        }
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        attrs.insert(key.to_string(), attr_unescape(&region[value_start..i]));
        i += 1;
    }
    attrs
}

/// Strict parse, then lenient repair: truncate after the final brace
/// (stripping trailing quote-garbage) and drop trailing commas.
pub fn parse_json_lenient(body: &str) -> Result<Value, ()> {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    let last_brace = trimmed.rfind(['}', ']']).ok_or(())?;
    let truncated = &trimmed[..=last_brace];
    let mut repaired = String::with_capacity(truncated.len());
    let mut pending_comma = false;
    let mut in_string = false;
    let mut escaped = false;
    for c in truncated.chars() {
        if in_string {
            repaired.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                flush_comma(&mut repaired, &mut pending_comma);
                repaired.push(c);
                in_string = true;
            }
            ',' => pending_comma = true,
            '}' | ']' => {
                // Trailing comma before a closer is dropped
                pending_comma = false;
                repaired.push(c);
            }
            c if c.is_whitespace() => repaired.push(c),
            _ => {
                flush_comma(&mut repaired, &mut pending_comma);
                repaired.push(c);
            }
        }
    }
    serde_json::from_str(&repaired).map_err(|_| ())
}

fn flush_comma(out: &mut String, pending: &mut bool) {
    if *pending {
        out.push(',');
        *pending = false;
    }
}

fn json_body(body: &str) -> JsonBody {
    match parse_json_lenient(body) {
        Ok(value) => JsonBody::Json(value),
        Err(()) => JsonBody::Malformed {
            raw: body.to_string(),
        },
    }
}

/// Type one raw tag, enforcing required attributes.
fn typed(raw: &RawTag) -> Result<Directive, String> {
    let attr = |name: &str| -> Result<String, String> {
        raw.attrs
            .get(name)
            .cloned()
            .ok_or_else(|| format!("missing required attribute '{name}'"))
    };
    let body = raw.body.trim();

    Ok(match raw.name.as_str() {
        "wa_message" => Directive::Message {
            text: body.to_string(),
        },
        "followup" => Directive::Followup {
            topic: body.to_string(),
            goal_id: raw.attrs.get("goal").map(|g| g.as_str().into()),
        },
        "next_cycle_minutes" => Directive::NextCycleMinutes {
            minutes: body
                .parse()
                .map_err(|_| format!("non-integer body '{body}'"))?,
        },
        "action_taken" => Directive::ActionTaken {
            text: body.to_string(),
        },
        "goal_create" => Directive::GoalCreate {
            title: attr("title")?,
            description: body.to_string(),
        },
        "goal_update" => {
            let status = match raw.attrs.get("status") {
                Some(s) => Some(
                    GoalStatus::parse(s).ok_or_else(|| format!("unknown status '{s}'"))?,
                ),
                None => None,
            };
            let progress = match raw.attrs.get("progress") {
                Some(p) => Some(
                    p.parse::<u16>()
                        .map(|p| p.min(100) as u8)
                        .map_err(|_| format!("non-numeric progress '{p}'"))?,
                ),
                None => None,
            };
            Directive::GoalUpdate {
                id: attr("id")?.into(),
                status,
                progress,
                note: body.to_string(),
            }
        }
        "milestone_complete" => Directive::MilestoneComplete {
            goal_id: attr("goal")?.into(),
            milestone_id: attr("milestone")?.into(),
            evidence: body.to_string(),
        },
        "goal_propose" => Directive::GoalPropose {
            title: attr("title")?,
            rationale: raw.attrs.get("rationale").cloned().unwrap_or_default(),
            milestones: body
                .lines()
                .map(|l| l.trim().trim_start_matches("- ").to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        },
        "tool_call" => Directive::ToolCall {
            name: attr("name")?,
            params: json_body(body),
        },
        "chain_plan" => Directive::ChainPlan {
            plan: if body.starts_with('{') || body.starts_with('[') {
                json_body(body)
            } else {
                JsonBody::Text(body.to_string())
            },
        },
        "lesson_learned" => Directive::LessonLearned {
            text: body.to_string(),
        },
        "capability_gap" => Directive::CapabilityGap {
            topic: attr("topic")?,
            text: body.to_string(),
        },
        "experiment_create" => Directive::ExperimentCreate {
            spec: json_body(body),
        },
        "hypothesis" => Directive::Hypothesis {
            text: body.to_string(),
        },
        "evidence" => Directive::Evidence {
            hypothesis_id: attr("hid")?,
            text: body.to_string(),
        },
        "conclude" => Directive::Conclude {
            hypothesis_id: attr("hid")?,
            text: body.to_string(),
        },
        "skill_generate" => Directive::SkillGenerate {
            name: attr("name")?,
            category: attr("category")?,
            description: body.to_string(),
        },
        other => return Err(format!("unknown tag '{other}'")),
    })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
