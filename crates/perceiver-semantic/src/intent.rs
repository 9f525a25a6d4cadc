//! Instruction analysis: action verbs, conflicts and keywords.

use std::fmt;

use guidepath_core_types::StepIntent;
use serde::{Deserialize, Serialize};

use crate::keywords::{contains_phrase, tokenize, word_position, KeywordExtractor};

/// Fixed vocabulary of actions an instruction can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVerb {
    Click,
    Select,
    Choose,
    Tap,
    Type,
    Enter,
    Write,
    Compose,
    Open,
    Close,
    Expand,
    Collapse,
    Submit,
    Send,
    Save,
    Delete,
    Edit,
    Create,
    Add,
    Remove,
    Update,
}

/// Which kind of element an action is performed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFamily {
    /// Inputs, textareas and editable regions.
    TextEntry,
    /// Buttons, links and other activatable controls.
    Activation,
}

impl ActionVerb {
    pub const ALL: [ActionVerb; 21] = [
        ActionVerb::Click,
        ActionVerb::Select,
        ActionVerb::Choose,
        ActionVerb::Tap,
        ActionVerb::Type,
        ActionVerb::Enter,
        ActionVerb::Write,
        ActionVerb::Compose,
        ActionVerb::Open,
        ActionVerb::Close,
        ActionVerb::Expand,
        ActionVerb::Collapse,
        ActionVerb::Submit,
        ActionVerb::Send,
        ActionVerb::Save,
        ActionVerb::Delete,
        ActionVerb::Edit,
        ActionVerb::Create,
        ActionVerb::Add,
        ActionVerb::Remove,
        ActionVerb::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionVerb::Click => "click",
            ActionVerb::Select => "select",
            ActionVerb::Choose => "choose",
            ActionVerb::Tap => "tap",
            ActionVerb::Type => "type",
            ActionVerb::Enter => "enter",
            ActionVerb::Write => "write",
            ActionVerb::Compose => "compose",
            ActionVerb::Open => "open",
            ActionVerb::Close => "close",
            ActionVerb::Expand => "expand",
            ActionVerb::Collapse => "collapse",
            ActionVerb::Submit => "submit",
            ActionVerb::Send => "send",
            ActionVerb::Save => "save",
            ActionVerb::Delete => "delete",
            ActionVerb::Edit => "edit",
            ActionVerb::Create => "create",
            ActionVerb::Add => "add",
            ActionVerb::Remove => "remove",
            ActionVerb::Update => "update",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == word)
    }

    /// `compose` opens an editor through a button, so it is an activation.
    pub fn family(&self) -> ActionFamily {
        match self {
            ActionVerb::Type | ActionVerb::Enter | ActionVerb::Write => ActionFamily::TextEntry,
            _ => ActionFamily::Activation,
        }
    }

    /// Words whose presence on an element contradicts this action.
    pub fn conflicts(&self) -> &'static [&'static str] {
        match self {
            ActionVerb::Type | ActionVerb::Write | ActionVerb::Enter => &["click", "compose", "send"],
            ActionVerb::Compose => &["create", "add", "new label", "delete", "remove", "type"],
            ActionVerb::Click => &["type", "write", "enter", "hover", "scroll", "drag"],
            ActionVerb::Select => &["deselect", "unselect", "clear"],
            ActionVerb::Open => &["close", "minimize", "hide"],
            ActionVerb::Create => &["delete", "remove", "compose"],
            ActionVerb::Send => &["save", "draft", "cancel", "type", "write"],
            _ => &[],
        }
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the scorers need to know about one instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentProfile {
    /// Lowercase instruction with collapsed whitespace.
    pub instruction: String,
    /// Actions found in the instruction, ordered by first appearance.
    pub actions: Vec<ActionVerb>,
    pub keywords: Vec<String>,
    pub target: Option<String>,
}

impl IntentProfile {
    pub fn analyze(intent: &StepIntent) -> Self {
        Self::analyze_with(intent, &KeywordExtractor::default())
    }

    pub fn analyze_with(intent: &StepIntent, extractor: &KeywordExtractor) -> Self {
        let words = tokenize(&intent.instruction);
        let mut found: Vec<(usize, ActionVerb)> = ActionVerb::ALL
            .into_iter()
            .filter_map(|verb| word_position(&words, verb.as_str()).map(|pos| (pos, verb)))
            .collect();
        found.sort_by_key(|(pos, _)| *pos);
        let actions: Vec<ActionVerb> = found.into_iter().map(|(_, verb)| verb).collect();

        let verbs: Vec<&str> = ActionVerb::ALL.iter().map(ActionVerb::as_str).collect();
        let keywords = extractor.extract(&intent.instruction, &verbs);

        Self {
            instruction: words.join(" "),
            actions,
            keywords,
            target: intent.target().map(str::to_lowercase),
        }
    }

    /// The earliest action in the instruction.
    pub fn primary(&self) -> Option<ActionVerb> {
        self.actions.first().copied()
    }

    pub fn secondary(&self) -> &[ActionVerb] {
        self.actions.get(1..).unwrap_or(&[])
    }

    pub fn family(&self) -> Option<ActionFamily> {
        self.primary().map(|verb| verb.family())
    }

    /// Conflict terms of the primary action found in `words`.
    pub fn conflicts_in(&self, words: &[String]) -> usize {
        self.primary().map_or(0, |verb| {
            verb.conflicts()
                .iter()
                .filter(|term| contains_phrase(words, term))
                .count()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(instruction: &str) -> IntentProfile {
        IntentProfile::analyze(&StepIntent::new("s", instruction))
    }

    #[test]
    fn earliest_action_is_primary() {
        let p = profile("Click the Create playlist button");
        assert_eq!(p.actions, vec![ActionVerb::Click, ActionVerb::Create]);
        assert_eq!(p.primary(), Some(ActionVerb::Click));
        assert_eq!(p.secondary(), &[ActionVerb::Create]);
        assert_eq!(p.keywords, vec!["playlist", "button"]);
    }

    #[test]
    fn verbs_must_be_whole_words() {
        let p = profile("Open the address book");
        assert_eq!(p.actions, vec![ActionVerb::Open]);
        assert!(profile("Review the entries").actions.is_empty());
    }

    #[test]
    fn compose_belongs_to_activation_family() {
        let p = profile("Compose a new email");
        assert_eq!(p.family(), Some(ActionFamily::Activation));
        assert_eq!(profile("Type the subject").family(), Some(ActionFamily::TextEntry));
    }

    #[test]
    fn counts_conflict_terms() {
        let p = profile("Compose a new email");
        assert_eq!(p.conflicts_in(&tokenize("Create label")), 1);
        assert_eq!(p.conflicts_in(&tokenize("Add new label")), 2);
        assert_eq!(p.conflicts_in(&tokenize("Compose")), 0);
    }

    #[test]
    fn verbs_serialize_lowercase() {
        let json = serde_json::to_string(&ActionVerb::Compose).unwrap();
        assert_eq!(json, "\"compose\"");
        let family: ActionFamily = serde_json::from_str("\"text_entry\"").unwrap();
        assert_eq!(family, ActionFamily::TextEntry);
    }

    #[test]
    fn no_action_means_no_primary() {
        let p = profile("Playlist settings");
        assert_eq!(p.primary(), None);
        assert_eq!(p.conflicts_in(&tokenize("delete")), 0);
    }

    #[test]
    fn target_is_lowercased_and_blank_dropped() {
        let intent = StepIntent::new("s", "Click save").with_target("Save-Button");
        assert_eq!(IntentProfile::analyze(&intent).target.as_deref(), Some("save-button"));
        let blank = StepIntent::new("s", "Click save").with_target(" ");
        assert_eq!(IntentProfile::analyze(&blank).target, None);
    }
}
