//! Arena-backed DOM snapshot.
//!
//! A snapshot is an immutable copy of the document at one instant. Nodes
//! live in a flat arena in document (pre-)order, so `NodeId` ordering is
//! document ordering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Rendered bounding box in CSS pixels, relative to the viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// The subset of computed style the oracle cares about.
///
/// `None` means "not declared here"; inherited properties are looked up on
/// ancestors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer_events: Option<String>,
}

impl ComputedStyle {
    fn is_empty(&self) -> bool {
        self.display.is_none()
            && self.visibility.is_none()
            && self.opacity.is_none()
            && self.pointer_events.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct DomNode {
    pub id: NodeId,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Text directly owned by this element, excluding descendants.
    pub text: String,
    pub rect: Option<Rect>,
    pub style: ComputedStyle,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl DomNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value, trimmed, `None` when missing or blank.
    pub fn attr_non_empty(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Boolean attribute semantics: present and not `"false"`.
    pub fn attr_flag(&self, name: &str) -> bool {
        self.attr(name)
            .map(|value| !value.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(false)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }
}

/// Serialized page fixture: what a content script would ship across.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageSpec {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewport: Viewport,
    pub root: NodeSpec,
}

/// Nested element description used to build snapshots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    #[serde(default, skip_serializing_if = "ComputedStyle::is_empty")]
    pub style: ComputedStyle,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(x, y, width, height));
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Clone, Debug)]
pub struct DomSnapshot {
    pub url: String,
    pub title: String,
    pub viewport: Viewport,
    nodes: Vec<DomNode>,
}

impl DomSnapshot {
    pub fn from_page(page: PageSpec) -> Self {
        let mut nodes = Vec::new();
        push_spec(&mut nodes, page.root, None);
        Self {
            url: page.url,
            title: page.title,
            viewport: page.viewport,
            nodes,
        }
    }

    /// Snapshot rooted at `root` with an empty url and default viewport.
    pub fn from_root(root: NodeSpec) -> Self {
        Self::from_page(PageSpec {
            root,
            ..PageSpec::default()
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.0)
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            snapshot: self,
            next: self.parent(id),
        }
    }

    /// Concatenated text of the node and its descendants, whitespace collapsed.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts);
        parts
            .iter()
            .flat_map(|part| part.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collect_text<'a>(&'a self, id: NodeId, out: &mut Vec<&'a str>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if !node.text.is_empty() {
            out.push(&node.text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    /// 1-based position among siblings sharing the same tag.
    pub fn nth_of_type(&self, id: NodeId) -> usize {
        let Some(node) = self.node(id) else {
            return 0;
        };
        let Some(parent) = node.parent.and_then(|p| self.node(p)) else {
            return 1;
        };
        parent
            .children
            .iter()
            .filter_map(|child| self.node(*child))
            .take_while(|sibling| sibling.id != id)
            .filter(|sibling| sibling.tag == node.tag)
            .count()
            + 1
    }

    pub fn find_by_attr(&self, name: &str, value: &str) -> impl Iterator<Item = &DomNode> {
        let name = name.to_string();
        let value = value.to_string();
        self.nodes
            .iter()
            .filter(move |node| node.attr(&name) == Some(value.as_str()))
    }

    /// Identity check across snapshots: same slot, same tag, same attributes.
    pub fn same_element(&self, id: NodeId, other: &DomSnapshot) -> bool {
        match (self.node(id), other.node(id)) {
            (Some(a), Some(b)) => a.tag == b.tag && a.attributes == b.attributes,
            _ => false,
        }
    }
}

pub struct Ancestors<'a> {
    snapshot: &'a DomSnapshot,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a DomNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.snapshot.node(self.next?)?;
        self.next = node.parent;
        Some(node)
    }
}

fn push_spec(nodes: &mut Vec<DomNode>, spec: NodeSpec, parent: Option<NodeId>) -> NodeId {
    let id = NodeId(nodes.len());
    let attributes = spec
        .attributes
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect();
    nodes.push(DomNode {
        id,
        tag: spec.tag.to_ascii_lowercase(),
        attributes,
        text: spec.text.unwrap_or_default(),
        rect: spec.rect,
        style: spec.style,
        parent,
        children: Vec::new(),
    });
    for child in spec.children {
        let child_id = push_spec(nodes, child, Some(id));
        nodes[id.0].children.push(child_id);
    }
    id
}
