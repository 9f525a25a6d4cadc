//! Visibility and interactability judges.
//!
//! Both judges are pure reads over a snapshot and cheap enough to run on
//! every candidate of a resolution pass.

use serde::{Deserialize, Serialize};

use crate::model::{DomNode, DomSnapshot, NodeId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeReport {
    pub ok: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl JudgeReport {
    fn from_issues(ok_label: &str, fail_label: &str, issues: Vec<String>) -> Self {
        let ok = issues.is_empty();
        let reason = if ok {
            ok_label.to_string()
        } else {
            format!("{fail_label}: {}", issues.join(", "))
        };
        Self { ok, reason, issues }
    }
}

pub fn is_visible(snapshot: &DomSnapshot, node: NodeId) -> bool {
    visible(snapshot, node).ok
}

pub fn is_interactable(snapshot: &DomSnapshot, node: NodeId) -> bool {
    interactable(snapshot, node).ok
}

/// Positive box that intersects the viewport vertically and is not hidden
/// by style or the `hidden` attribute on itself or an ancestor.
pub fn visible(snapshot: &DomSnapshot, node: NodeId) -> JudgeReport {
    let Some(dom) = snapshot.node(node) else {
        return JudgeReport::from_issues("visible", "not_visible", vec!["missing_node".into()]);
    };

    let mut issues = Vec::new();
    match dom.rect {
        Some(rect) => {
            if rect.width <= 0.0 || rect.height <= 0.0 {
                issues.push("zero_area".into());
            }
            if rect.y >= snapshot.viewport.height || rect.bottom() <= 0.0 {
                issues.push("outside_viewport".into());
            }
        }
        None => issues.push("missing_geometry".into()),
    }

    let chain = || std::iter::once(dom).chain(snapshot.ancestors(node));
    if chain().any(|n| n.attr_flag("hidden")) {
        issues.push("hidden_attribute".into());
    }
    if chain().any(|n| {
        n.style
            .display
            .as_deref()
            .map_or(false, |d| d.trim().eq_ignore_ascii_case("none"))
    }) {
        issues.push("display_none".into());
    }
    if chain().any(|n| n.style.opacity.map_or(false, |o| o <= 0.0)) {
        issues.push("opacity_zero".into());
    }
    if let Some(visibility) = inherited(dom, snapshot, |n| n.style.visibility.as_deref()) {
        if matches!(visibility.trim(), "hidden" | "collapse") {
            issues.push("visibility_hidden".into());
        }
    }

    JudgeReport::from_issues("visible", "not_visible", issues)
}

/// Visible, enabled, and not excluded from pointer events.
pub fn interactable(snapshot: &DomSnapshot, node: NodeId) -> JudgeReport {
    let visibility = visible(snapshot, node);
    let Some(dom) = snapshot.node(node) else {
        return visibility;
    };

    let mut issues = visibility.issues;
    if is_disabled(snapshot, dom) {
        issues.push("disabled".into());
    }
    if let Some(events) = inherited(dom, snapshot, |n| n.style.pointer_events.as_deref()) {
        if events.trim().eq_ignore_ascii_case("none") {
            issues.push("pointer_events_none".into());
        }
    }

    JudgeReport::from_issues("interactable", "not_interactable", issues)
}

/// `disabled`, `aria-disabled="true"`, or inside a disabled fieldset.
pub fn is_disabled(snapshot: &DomSnapshot, node: &DomNode) -> bool {
    if node.has_attr("disabled") && node.attr_flag("disabled") {
        return true;
    }
    if node
        .attr("aria-disabled")
        .map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
    {
        return true;
    }
    snapshot
        .ancestors(node.id)
        .any(|ancestor| ancestor.tag == "fieldset" && ancestor.has_attr("disabled"))
}

fn inherited<'a, F>(node: &'a DomNode, snapshot: &'a DomSnapshot, read: F) -> Option<&'a str>
where
    F: Fn(&'a DomNode) -> Option<&'a str>,
{
    std::iter::once(node)
        .chain(snapshot.ancestors(node.id))
        .find_map(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComputedStyle, NodeSpec, Viewport};

    fn page(children: Vec<NodeSpec>) -> DomSnapshot {
        DomSnapshot::from_root(NodeSpec::new("body").rect(0.0, 0.0, 1280.0, 800.0).children(children))
    }

    #[test]
    fn visible_requires_positive_box_inside_viewport() {
        let snap = page(vec![
            NodeSpec::new("button").rect(10.0, 10.0, 80.0, 20.0),
            NodeSpec::new("button").rect(10.0, 10.0, 0.0, 20.0),
            NodeSpec::new("button").rect(10.0, 900.0, 80.0, 20.0),
            NodeSpec::new("button").rect(10.0, -40.0, 80.0, 20.0),
            NodeSpec::new("button"),
        ]);
        assert!(is_visible(&snap, NodeId(1)));
        assert!(!is_visible(&snap, NodeId(2)));
        assert!(!is_visible(&snap, NodeId(3)));
        assert!(!is_visible(&snap, NodeId(4)));
        let report = visible(&snap, NodeId(5));
        assert!(!report.ok);
        assert_eq!(report.issues, vec!["missing_geometry".to_string()]);
    }

    #[test]
    fn hidden_ancestors_hide_descendants() {
        let hidden = ComputedStyle {
            display: Some("none".into()),
            ..ComputedStyle::default()
        };
        let snap = page(vec![NodeSpec::new("div")
            .rect(0.0, 0.0, 100.0, 100.0)
            .style(hidden)
            .child(NodeSpec::new("button").rect(0.0, 0.0, 50.0, 20.0))]);
        assert!(!is_visible(&snap, NodeId(2)));
    }

    #[test]
    fn visibility_is_inherited_but_overridable() {
        let hidden = ComputedStyle {
            visibility: Some("hidden".into()),
            ..ComputedStyle::default()
        };
        let shown = ComputedStyle {
            visibility: Some("visible".into()),
            ..ComputedStyle::default()
        };
        let snap = page(vec![NodeSpec::new("div")
            .rect(0.0, 0.0, 100.0, 100.0)
            .style(hidden)
            .child(NodeSpec::new("a").rect(0.0, 0.0, 50.0, 20.0))
            .child(NodeSpec::new("a").rect(0.0, 30.0, 50.0, 20.0).style(shown))]);
        assert!(!is_visible(&snap, NodeId(2)));
        assert!(is_visible(&snap, NodeId(3)));
    }

    #[test]
    fn interactable_rejects_disabled_and_pointer_events_none() {
        let no_pointer = ComputedStyle {
            pointer_events: Some("none".into()),
            ..ComputedStyle::default()
        };
        let snap = page(vec![
            NodeSpec::new("button").rect(0.0, 0.0, 50.0, 20.0),
            NodeSpec::new("button").attr("disabled", "").rect(0.0, 30.0, 50.0, 20.0),
            NodeSpec::new("button")
                .attr("aria-disabled", "true")
                .rect(0.0, 60.0, 50.0, 20.0),
            NodeSpec::new("button").style(no_pointer).rect(0.0, 90.0, 50.0, 20.0),
        ]);
        assert!(is_interactable(&snap, NodeId(1)));
        assert!(!is_interactable(&snap, NodeId(2)));
        assert!(!is_interactable(&snap, NodeId(3)));
        assert!(!is_interactable(&snap, NodeId(4)));
        assert!(is_visible(&snap, NodeId(4)));
    }

    #[test]
    fn respects_custom_viewport_height() {
        let mut snap = page(vec![NodeSpec::new("a").rect(0.0, 500.0, 40.0, 10.0)]);
        snap.viewport = Viewport {
            width: 400.0,
            height: 400.0,
        };
        assert!(!is_visible(&snap, NodeId(1)));
    }
}
