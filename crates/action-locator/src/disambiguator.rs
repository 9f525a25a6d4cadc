//! Prompt construction and tolerant reply parsing for the AI strategy.

use once_cell::sync::Lazy;
use perceiver_structural::{Candidate, DomSnapshot};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;

use crate::types::{truncate_chars, ResolutionContext};

pub const DEFAULT_GUIDANCE: &str = "AI couldn't locate a specific element.";
pub const UNCLEAR_GUIDANCE: &str = "AI analysis was unclear.";

const CANDIDATE_TEXT_LIMIT: usize = 80;
const RAW_GUIDANCE_LIMIT: usize = 200;

/// Attributes shown to the model for each candidate.
const PROMPT_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "type",
    "role",
    "aria-label",
    "placeholder",
    "title",
    "data-testid",
    "data-automation-id",
];

static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Render the disambiguation prompt for `candidates`, best first.
pub fn build_prompt(ctx: &ResolutionContext, candidates: &[Candidate]) -> String {
    let instruction = ctx.intent.instruction.trim();
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are helping a user navigate a web page. The user wants to: \"{instruction}\""
    );
    if let Some(target) = ctx.intent.target() {
        let _ = writeln!(prompt, "Target element hint: \"{target}\"");
    }

    if let Some(workflow) = ctx.workflow.as_ref() {
        if !workflow.previous_steps.is_empty() || workflow.next_step.is_some() {
            prompt.push('\n');
            match workflow.workflow_name.as_deref() {
                Some(name) => {
                    let _ = writeln!(prompt, "Workflow context ({name}):");
                }
                None => prompt.push_str("Workflow context:\n"),
            }
            if !workflow.previous_steps.is_empty() {
                prompt.push_str("Previous steps completed:\n");
                for (index, step) in workflow.previous_steps.iter().enumerate() {
                    let _ = writeln!(prompt, "{}. {step} ✓", index + 1);
                }
            }
            let current_index = workflow.previous_steps.len() + 1;
            let current = if workflow.current_step.trim().is_empty() {
                instruction
            } else {
                workflow.current_step.trim()
            };
            let _ = writeln!(prompt, "Current step:\n{current_index}. {current} ← YOU ARE HERE");
            if let Some(next) = workflow.next_step.as_deref() {
                let _ = writeln!(prompt, "Next step:\n{}. {next}", current_index + 1);
            }
        }
    }

    let _ = writeln!(prompt, "\nURL: {}", ctx.snapshot.url);
    prompt.push_str("\nAvailable interactive elements (sorted by relevance score):\n");
    for candidate in candidates {
        prompt.push_str(&candidate_line(&ctx.snapshot, candidate));
        prompt.push('\n');
    }

    prompt.push_str(
        "\nElements are pre-sorted by relevance to the task. Be concise and answer with JSON only, in this format:\n\
         {\"candidateId\": \"candidate_X\" or null, \"confidence\": 0-100, \"reasoning\": \"why you chose this element\", \"guidance\": \"what the user should look for or do next\"}\n",
    );
    prompt
}

fn candidate_line(snapshot: &DomSnapshot, candidate: &Candidate) -> String {
    let tag = &candidate.facts.tag;
    let mut attrs = String::new();
    if let Some(node) = snapshot.node(candidate.node) {
        for name in PROMPT_ATTRIBUTES {
            if let Some(value) = node.attr_non_empty(name) {
                let _ = write!(attrs, " {name}=\"{}\"", value.replace('"', "'"));
            }
        }
    }
    let text = truncate_chars(&candidate.facts.text, CANDIDATE_TEXT_LIMIT);
    if candidate.relevance > 0.0 {
        format!(
            "{} [relevance: {:.1}]: <{tag}{attrs}>{text}</{tag}>",
            candidate.id, candidate.relevance
        )
    } else {
        format!("{}: <{tag}{attrs}>{text}</{tag}>", candidate.id)
    }
}

/// Structured answer from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct AiVerdict {
    /// `candidate_<n>` when the model picked an element.
    pub candidate_id: Option<String>,
    /// Model confidence, clamped to 0..=100.
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub guidance: Option<String>,
}

impl AiVerdict {
    pub fn guidance_or_default(&self) -> String {
        self.guidance
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .unwrap_or(DEFAULT_GUIDANCE)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Verdict(AiVerdict),
    /// No usable JSON; the raw text becomes guidance.
    Unparsed { guidance: String },
}

#[derive(Deserialize)]
struct RawVerdict {
    #[serde(rename = "candidateId", alias = "candidate_id", default)]
    candidate_id: Value,
    #[serde(default)]
    confidence: Value,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    guidance: Option<String>,
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let Some(json) = extract_json_object(raw) else {
        return ParsedReply::Unparsed {
            guidance: fallback_guidance(raw),
        };
    };
    let cleaned = normalize_json(&json);
    match serde_json::from_str::<RawVerdict>(&cleaned) {
        Ok(parsed) => ParsedReply::Verdict(AiVerdict {
            candidate_id: candidate_id(&parsed.candidate_id),
            confidence: confidence(&parsed.confidence),
            reasoning: parsed.reasoning,
            guidance: parsed.guidance,
        }),
        Err(_) => ParsedReply::Unparsed {
            guidance: fallback_guidance(raw),
        },
    }
}

/// Fenced block (```json or ```), otherwise the first balanced object.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = after_lang.find(fence) {
            let block = &after_lang[..end];
            if let Some(object) = balanced_object(block) {
                return Some(object);
            }
        }
    }
    balanced_object(raw)
}

fn balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + idx].trim().to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Control whitespace to spaces, runs collapsed, trailing commas dropped.
pub fn normalize_json(json: &str) -> String {
    let flattened = json.replace(&['\n', '\r', '\t'][..], " ");
    let collapsed = WHITESPACE_RUN.replace_all(&flattened, " ");
    TRAILING_COMMA.replace_all(&collapsed, "$1").trim().to_string()
}

fn fallback_guidance(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNCLEAR_GUIDANCE.to_string()
    } else {
        truncate_chars(trimmed, RAW_GUIDANCE_LIMIT)
    }
}

fn candidate_id(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.as_u64()?.to_string(),
        _ => return None,
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") || raw.eq_ignore_ascii_case("none") {
        return None;
    }
    match raw.parse::<usize>() {
        Ok(index) => Some(format!("candidate_{index}")),
        Err(_) => Some(raw),
    }
}

fn confidence(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .map_or(0.0, |v| v.clamp(0.0, 100.0))
}
