//! Derived element facts: role, accessible name and editability.

use serde::{Deserialize, Serialize};

use crate::judges;
use crate::model::{DomNode, DomSnapshot, NodeId};

/// Tags that are interactive on their own.
pub const INTERACTIVE_TAGS: &[&str] = &[
    "a", "button", "input", "select", "textarea", "option", "label", "summary", "details",
];

/// ARIA roles that indicate interactivity.
pub const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "checkbox",
    "radio",
    "textbox",
    "combobox",
    "listbox",
    "option",
    "menuitem",
    "tab",
    "switch",
    "slider",
    "spinbutton",
    "searchbox",
    "gridcell",
    "treeitem",
];

const TEXT_INPUT_TYPES: &[&str] = &[
    "", "text", "search", "email", "password", "tel", "url", "number",
];

const BUTTON_INPUT_TYPES: &[&str] = &["button", "submit", "reset", "image"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementFacts {
    pub node: NodeId,
    pub tag: String,
    /// Explicit `role` attribute or the implicit role of the tag.
    pub role: Option<String>,
    pub explicit_role: bool,
    pub accessible_name: String,
    pub aria_label: Option<String>,
    pub placeholder: Option<String>,
    pub name: Option<String>,
    pub element_id: Option<String>,
    pub title: Option<String>,
    pub input_type: Option<String>,
    /// `data-automation-id` and `data-testid` values.
    pub automation_ids: Vec<String>,
    /// Visible text, whitespace collapsed.
    pub text: String,
    pub editable: bool,
    pub disabled: bool,
    pub aria_hidden: bool,
}

impl ElementFacts {
    pub fn derive(snapshot: &DomSnapshot, node: NodeId) -> Option<Self> {
        let dom = snapshot.node(node)?;
        let explicit = dom
            .attr_non_empty("role")
            .and_then(|r| r.split_whitespace().next())
            .map(str::to_ascii_lowercase);
        let explicit_role = explicit.is_some();
        let role = explicit.or_else(|| implicit_role(dom).map(str::to_string));
        let input_type = (dom.tag == "input")
            .then(|| dom.attr("type").unwrap_or("").trim().to_ascii_lowercase());
        let text = snapshot.text_content(node);

        let mut facts = Self {
            node,
            tag: dom.tag.clone(),
            editable: is_editable(dom, role.as_deref()),
            role,
            explicit_role,
            accessible_name: String::new(),
            aria_label: dom.attr_non_empty("aria-label").map(str::to_string),
            placeholder: dom.attr_non_empty("placeholder").map(str::to_string),
            name: dom.attr_non_empty("name").map(str::to_string),
            element_id: dom.attr_non_empty("id").map(str::to_string),
            title: dom.attr_non_empty("title").map(str::to_string),
            input_type,
            automation_ids: ["data-automation-id", "data-testid"]
                .iter()
                .filter_map(|attr| dom.attr_non_empty(attr))
                .map(str::to_string)
                .collect(),
            text,
            disabled: judges::is_disabled(snapshot, dom),
            aria_hidden: std::iter::once(dom)
                .chain(snapshot.ancestors(node))
                .any(|n| n.attr("aria-hidden").map_or(false, |v| v.trim() == "true")),
        };
        facts.accessible_name = accessible_name(snapshot, dom, &facts);
        Some(facts)
    }

    pub fn is_interactive_tag(&self) -> bool {
        INTERACTIVE_TAGS.contains(&self.tag.as_str())
    }

    /// Interactive tags plus editable regions, whatever their tag.
    pub fn is_interactive_element(&self) -> bool {
        self.editable || self.is_interactive_tag()
    }

    pub fn has_interactive_role(&self) -> bool {
        self.role
            .as_deref()
            .map_or(false, |role| INTERACTIVE_ROLES.contains(&role))
    }

    /// Buttons, links and anything exposed with a button-like role.
    pub fn is_activatable(&self) -> bool {
        if self.editable {
            return false;
        }
        matches!(self.tag.as_str(), "button" | "a" | "summary")
            || matches!(
                self.role.as_deref(),
                Some("button" | "link" | "menuitem" | "tab" | "option" | "switch")
            )
    }

    /// Lowercase accessible name, label, placeholder, title and visible text.
    pub fn combined_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.accessible_name.as_str()];
        for extra in [&self.aria_label, &self.placeholder, &self.title] {
            if let Some(value) = extra {
                if !parts.contains(&value.as_str()) {
                    parts.push(value);
                }
            }
        }
        if !parts.contains(&self.text.as_str()) {
            parts.push(&self.text);
        }
        parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

pub fn implicit_role(node: &DomNode) -> Option<&'static str> {
    match node.tag.as_str() {
        "button" | "summary" => Some("button"),
        "a" if node.has_attr("href") => Some("link"),
        "textarea" => Some("textbox"),
        "select" => Some("combobox"),
        "option" => Some("option"),
        "input" => {
            let kind = node.attr("type").unwrap_or("").trim().to_ascii_lowercase();
            match kind.as_str() {
                "checkbox" => Some("checkbox"),
                "radio" => Some("radio"),
                "range" => Some("slider"),
                "search" => Some("searchbox"),
                k if BUTTON_INPUT_TYPES.contains(&k) => Some("button"),
                k if TEXT_INPUT_TYPES.contains(&k) => Some("textbox"),
                _ => None,
            }
        }
        _ if is_content_editable(node) => Some("textbox"),
        _ => None,
    }
}

fn is_editable(node: &DomNode, role: Option<&str>) -> bool {
    match node.tag.as_str() {
        "textarea" => return true,
        "input" => {
            let kind = node.attr("type").unwrap_or("").trim().to_ascii_lowercase();
            return TEXT_INPUT_TYPES.contains(&kind.as_str());
        }
        _ => {}
    }
    is_content_editable(node) || matches!(role, Some("textbox" | "searchbox"))
}

fn is_content_editable(node: &DomNode) -> bool {
    node.attr("contenteditable").map_or(false, |value| {
        let value = value.trim().to_ascii_lowercase();
        value.is_empty() || value == "true" || value == "plaintext-only"
    })
}

/// Simplified accessible-name computation.
///
/// Order: `aria-label`, `aria-labelledby`, associated `<label>`, `alt`,
/// `title`, visible text, `placeholder`.
fn accessible_name(snapshot: &DomSnapshot, node: &DomNode, facts: &ElementFacts) -> String {
    if let Some(label) = &facts.aria_label {
        return label.clone();
    }
    if let Some(ids) = node.attr_non_empty("aria-labelledby") {
        let joined = ids
            .split_whitespace()
            .filter_map(|id| snapshot.find_by_attr("id", id).next())
            .map(|target| snapshot.text_content(target.id))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            return joined;
        }
    }
    if matches!(node.tag.as_str(), "input" | "textarea" | "select") {
        if let Some(label) = associated_label(snapshot, node) {
            return label;
        }
    }
    if let Some(alt) = node.attr_non_empty("alt") {
        return alt.to_string();
    }
    if let Some(title) = &facts.title {
        return title.clone();
    }
    if !facts.text.is_empty() {
        return facts.text.clone();
    }
    facts.placeholder.clone().unwrap_or_default()
}

fn associated_label(snapshot: &DomSnapshot, node: &DomNode) -> Option<String> {
    if let Some(id) = node.attr_non_empty("id") {
        let by_for = snapshot
            .nodes()
            .filter(|n| n.tag == "label" && n.attr("for") == Some(id))
            .map(|label| snapshot.text_content(label.id))
            .find(|text| !text.is_empty());
        if by_for.is_some() {
            return by_for;
        }
    }
    snapshot
        .ancestors(node.id)
        .find(|ancestor| ancestor.tag == "label")
        .map(|label| snapshot.text_content(label.id))
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeSpec;

    fn facts_for(root: NodeSpec, node: usize) -> ElementFacts {
        let snap = DomSnapshot::from_root(root);
        ElementFacts::derive(&snap, NodeId(node)).unwrap()
    }

    #[test]
    fn aria_label_wins_over_text() {
        let facts = facts_for(
            NodeSpec::new("body").child(
                NodeSpec::new("button")
                    .attr("aria-label", "Create playlist")
                    .text("New"),
            ),
            1,
        );
        assert_eq!(facts.accessible_name, "Create playlist");
        assert_eq!(facts.role.as_deref(), Some("button"));
        assert!(!facts.explicit_role);
        assert!(facts.is_activatable());
        assert_eq!(facts.combined_text(), "create playlist new");
    }

    #[test]
    fn label_for_names_inputs() {
        let facts = facts_for(
            NodeSpec::new("body")
                .child(NodeSpec::new("label").attr("for", "email").text("Email address"))
                .child(NodeSpec::new("input").attr("id", "email").attr("type", "email")),
            2,
        );
        assert_eq!(facts.accessible_name, "Email address");
        assert!(facts.editable);
        assert_eq!(facts.role.as_deref(), Some("textbox"));
    }

    #[test]
    fn wrapping_label_and_placeholder_fallback() {
        let wrapped = facts_for(
            NodeSpec::new("body").child(
                NodeSpec::new("label")
                    .text("Subject")
                    .child(NodeSpec::new("input")),
            ),
            2,
        );
        assert_eq!(wrapped.accessible_name, "Subject");

        let bare = facts_for(
            NodeSpec::new("body").child(NodeSpec::new("input").attr("placeholder", "Search mail")),
            1,
        );
        assert_eq!(bare.accessible_name, "Search mail");
    }

    #[test]
    fn aria_labelledby_resolves_referenced_text() {
        let facts = facts_for(
            NodeSpec::new("body")
                .child(NodeSpec::new("span").attr("id", "lbl").text("Playlist title"))
                .child(
                    NodeSpec::new("div")
                        .attr("role", "textbox")
                        .attr("aria-labelledby", "lbl"),
                ),
            2,
        );
        assert_eq!(facts.accessible_name, "Playlist title");
        assert!(facts.editable);
        assert!(facts.explicit_role);
    }

    #[test]
    fn contenteditable_regions_are_editable() {
        let facts = facts_for(
            NodeSpec::new("body").child(NodeSpec::new("div").attr("contenteditable", "true")),
            1,
        );
        assert!(facts.editable);
        assert!(!facts.is_activatable());
        assert_eq!(facts.role.as_deref(), Some("textbox"));
        assert!(!facts.explicit_role);
        assert!(facts.is_interactive_element());
    }

    #[test]
    fn checkbox_inputs_are_not_editable() {
        let facts = facts_for(
            NodeSpec::new("body").child(NodeSpec::new("input").attr("type", "checkbox")),
            1,
        );
        assert!(!facts.editable);
        assert_eq!(facts.role.as_deref(), Some("checkbox"));
    }
}
