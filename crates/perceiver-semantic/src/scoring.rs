//! Scoring functions mapping (element, intent) to a relevance score.
//!
//! Every scorer returns a non-negative value; zero means "no evidence".
//! Scores are local to the scorer that produced them and are only ever
//! compared against that scorer's own threshold.

use perceiver_structural::{ElementFacts, RelevanceRanker};
use serde::{Deserialize, Serialize};

use crate::intent::{ActionFamily, IntentProfile};
use crate::keywords::{contains_phrase, tokenize};

/// Pass/fail bars for each strategy family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringThresholds {
    pub accessibility: f64,
    pub text: f64,
    pub attribute: f64,
    /// Fuzzy keyword coverage must be strictly above this value.
    pub fuzzy: f64,
    /// Minimum stored confidence for a pattern-cache hit.
    pub min_pattern_confidence: f64,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            accessibility: 12.0,
            text: 8.0,
            attribute: 2.0,
            fuzzy: 0.5,
            min_pattern_confidence: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityWeights {
    pub interactive_tag: f64,
    pub interactive_role: f64,
    pub exact_phrase: f64,
    pub primary_action: f64,
    pub secondary_action: f64,
    pub family_match: f64,
    pub sole_compatible: f64,
    pub keyword: f64,
    pub target: f64,
    pub conflict_penalty: f64,
}

impl Default for AccessibilityWeights {
    fn default() -> Self {
        Self {
            interactive_tag: 2.0,
            interactive_role: 2.0,
            exact_phrase: 15.0,
            primary_action: 8.0,
            secondary_action: 4.0,
            family_match: 4.0,
            sole_compatible: 4.0,
            keyword: 5.0,
            target: 6.0,
            conflict_penalty: 15.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextWeights {
    pub max_text_len: usize,
    pub primary_action: f64,
    pub secondary_action: f64,
    pub keyword: f64,
    pub exact_phrase: f64,
    pub target: f64,
    pub conflict_penalty: f64,
}

impl Default for TextWeights {
    fn default() -> Self {
        Self {
            max_text_len: 200,
            primary_action: 6.0,
            secondary_action: 2.0,
            keyword: 2.0,
            exact_phrase: 5.0,
            target: 10.0,
            conflict_penalty: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceWeights {
    pub family_match: f64,
    pub button_role: f64,
    pub keyword_text: f64,
    pub keyword_attribute: f64,
    pub multi_attribute_bonus: f64,
    pub target: f64,
    pub hidden_penalty: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            family_match: 10.0,
            button_role: 8.0,
            keyword_text: 5.0,
            keyword_attribute: 10.0,
            multi_attribute_bonus: 5.0,
            target: 15.0,
            hidden_penalty: 20.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub accessibility: AccessibilityWeights,
    pub text: TextWeights,
    pub relevance: RelevanceWeights,
}

/// Page-level facts that influence per-element scores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageContext {
    /// How many candidates fit the primary action's element family.
    pub family_compatible: usize,
}

impl PageContext {
    pub fn from_candidates<'a, I>(profile: &IntentProfile, candidates: I) -> Self
    where
        I: IntoIterator<Item = &'a ElementFacts>,
    {
        let family_compatible = match profile.family() {
            Some(family) => candidates
                .into_iter()
                .filter(|facts| family_compatible(family, facts))
                .count(),
            None => 0,
        };
        Self { family_compatible }
    }
}

/// Does the element kind fit the action family?
pub fn family_compatible(family: ActionFamily, facts: &ElementFacts) -> bool {
    match family {
        ActionFamily::TextEntry => facts.editable,
        ActionFamily::Activation => {
            facts.is_activatable()
                || facts.tag == "select"
                || matches!(
                    facts.role.as_deref(),
                    Some("checkbox" | "radio" | "combobox" | "listbox")
                )
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Accessibility-based score.
    ///
    /// Zero when the instruction has no action, or when the element neither
    /// mentions an instruction action nor fits the action's element family.
    pub fn accessibility(
        &self,
        facts: &ElementFacts,
        profile: &IntentProfile,
        page: &PageContext,
    ) -> f64 {
        let w = &self.weights.accessibility;
        let Some(primary) = profile.primary() else {
            return 0.0;
        };
        let combined = facts.combined_text();
        let words = tokenize(&combined);
        let mut score = 0.0;

        if facts.is_interactive_element() {
            score += w.interactive_tag;
        }
        if facts.has_interactive_role() {
            score += w.interactive_role;
        }
        if exact_phrase(&combined, &facts.accessible_name, &profile.instruction) {
            score += w.exact_phrase;
        }

        let action_matched = match profile
            .actions
            .iter()
            .find(|verb| contains_phrase(&words, verb.as_str()))
        {
            Some(verb) if *verb == primary => {
                score += w.primary_action;
                true
            }
            Some(_) => {
                score += w.secondary_action;
                true
            }
            None => false,
        };

        let compatible = family_compatible(primary.family(), facts);
        if compatible {
            score += w.family_match;
            if page.family_compatible == 1 {
                score += w.sole_compatible;
            }
        }

        if !action_matched && !compatible {
            return 0.0;
        }

        let keyword_hits = profile
            .keywords
            .iter()
            .filter(|kw| combined.contains(kw.as_str()))
            .count();
        score += keyword_hits as f64 * w.keyword;

        if target_matches(facts, &combined, profile.target.as_deref()) {
            score += w.target;
        }

        score -= profile.conflicts_in(&words) as f64 * w.conflict_penalty;
        score.max(0.0)
    }

    /// Text-content score over the element's visible text.
    pub fn text(&self, facts: &ElementFacts, profile: &IntentProfile) -> f64 {
        let w = &self.weights.text;
        let text = facts.text.to_lowercase();
        let len = text.chars().count();
        if len == 0 || len > w.max_text_len {
            return 0.0;
        }
        let words = tokenize(&text);
        let mut score = 0.0;

        let primary = profile.primary();
        let primary_matched = primary.map_or(false, |verb| contains_phrase(&words, verb.as_str()));
        if primary_matched {
            score += w.primary_action;
        }
        for verb in profile.secondary() {
            if contains_phrase(&words, verb.as_str()) {
                score += w.secondary_action;
            }
        }

        let keyword_hits = profile
            .keywords
            .iter()
            .filter(|kw| text.contains(kw.as_str()))
            .count();
        score += keyword_hits as f64 * w.keyword;

        if (primary_matched || primary.is_none()) && profile.instruction.contains(&words.join(" ")) {
            score += w.exact_phrase;
        }
        if target_matches(facts, &text, profile.target.as_deref()) {
            score += w.target;
        }

        score -= profile.conflicts_in(&words) as f64 * w.conflict_penalty;
        score.max(0.0)
    }

    /// Soft pre-score used to rank candidates before capping.
    pub fn relevance(&self, facts: &ElementFacts, profile: &IntentProfile) -> f64 {
        let w = &self.weights.relevance;
        let mut score = 0.0;

        match profile.family() {
            Some(ActionFamily::TextEntry) if facts.editable => score += w.family_match,
            Some(ActionFamily::Activation) => {
                if matches!(facts.tag.as_str(), "button" | "a") {
                    score += w.family_match;
                } else if facts.role.as_deref() == Some("button") {
                    score += w.button_role;
                }
            }
            _ => {}
        }

        let combined = facts.combined_text();
        let attributes = attribute_text(facts);
        let mut attribute_hits = 0usize;
        for keyword in &profile.keywords {
            if combined.contains(keyword.as_str()) {
                score += w.keyword_text;
            }
            if attributes.contains(keyword.as_str()) {
                score += w.keyword_attribute;
                attribute_hits += 1;
            }
        }
        if attribute_hits >= 2 {
            score += attribute_hits as f64 * w.multi_attribute_bonus;
        }

        if target_matches(facts, &combined, profile.target.as_deref()) {
            score += w.target;
        }
        if facts.disabled || facts.aria_hidden {
            score -= w.hidden_penalty;
        }
        score.max(0.0)
    }

    /// +1 per (keyword, identifying attribute) containment, +3 when an
    /// attribute equals the target.
    pub fn attribute(&self, facts: &ElementFacts, profile: &IntentProfile) -> f64 {
        let values: Vec<String> = identifying_values(facts)
            .map(|value| value.to_lowercase())
            .collect();
        let mut score = 0.0;
        for keyword in &profile.keywords {
            score += values
                .iter()
                .filter(|value| value.contains(keyword.as_str()))
                .count() as f64;
        }
        if let Some(target) = profile.target.as_deref() {
            if values.iter().any(|value| value == target) {
                score += 3.0;
            }
        }
        score
    }

    /// Fraction of instruction keywords present, +0.5 when all are.
    pub fn fuzzy(&self, facts: &ElementFacts, profile: &IntentProfile) -> f64 {
        if profile.keywords.is_empty() {
            return 0.0;
        }
        let combined = facts.combined_text();
        let found = profile
            .keywords
            .iter()
            .filter(|kw| combined.contains(kw.as_str()))
            .count();
        let mut score = found as f64 / profile.keywords.len() as f64;
        if found == profile.keywords.len() {
            score += 0.5;
        }
        score
    }

    pub fn ranker<'a>(&'a self, profile: &'a IntentProfile) -> IntentRanker<'a> {
        IntentRanker {
            scorer: self,
            profile,
        }
    }
}

/// Adapts [`Scorer::relevance`] to the collector's ranking seam.
pub struct IntentRanker<'a> {
    scorer: &'a Scorer,
    profile: &'a IntentProfile,
}

impl RelevanceRanker for IntentRanker<'_> {
    fn relevance(&self, facts: &ElementFacts) -> f64 {
        self.scorer.relevance(facts, self.profile)
    }
}

fn identifying_values(facts: &ElementFacts) -> impl Iterator<Item = &str> {
    facts
        .automation_ids
        .iter()
        .map(String::as_str)
        .chain(facts.aria_label.as_deref())
        .chain(facts.name.as_deref())
        .chain(facts.placeholder.as_deref())
}

fn attribute_text(facts: &ElementFacts) -> String {
    [
        facts.aria_label.as_deref(),
        facts.placeholder.as_deref(),
        facts.name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

fn exact_phrase(combined: &str, accessible_name: &str, instruction: &str) -> bool {
    if instruction.is_empty() {
        return false;
    }
    normalize(combined).contains(instruction) || normalize(accessible_name) == instruction
}

fn target_matches(facts: &ElementFacts, text: &str, target: Option<&str>) -> bool {
    let Some(target) = target.filter(|t| !t.is_empty()) else {
        return false;
    };
    text.contains(target)
        || facts
            .automation_ids
            .iter()
            .chain(facts.element_id.iter())
            .chain(facts.name.iter())
            .any(|value| value.eq_ignore_ascii_case(target))
}
