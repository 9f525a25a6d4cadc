//! Unique selector generation for a node.

use crate::model::{DomSnapshot, NodeId};
use crate::selector::{is_plain_ident, query_selector_all, quote_attr_value};

/// Attributes tried in order before falling back to classes and paths.
const IDENTIFYING_ATTRIBUTES: &[&str] = &["data-automation-id", "data-testid", "aria-label", "name"];

/// Build a selector that matches `node` and nothing else in `snapshot`.
///
/// Returns `None` only when the node does not exist.
pub fn unique_selector(snapshot: &DomSnapshot, node: NodeId) -> Option<String> {
    let dom = snapshot.node(node)?;

    if let Some(id) = dom.attr_non_empty("id") {
        let candidate = id_selector(id);
        if is_unique(snapshot, &candidate, node) {
            return Some(candidate);
        }
    }

    for attr in IDENTIFYING_ATTRIBUTES {
        if let Some(value) = dom.attr_non_empty(attr) {
            let candidate = format!("[{attr}={}]", quote_attr_value(value));
            if is_unique(snapshot, &candidate, node) {
                return Some(candidate);
            }
        }
    }

    let classes: Vec<&str> = dom.classes().filter(|c| is_plain_ident(c)).collect();
    if !classes.is_empty() {
        let candidate = format!("{}.{}", dom.tag, classes.join("."));
        if is_unique(snapshot, &candidate, node) {
            return Some(candidate);
        }
    }

    Some(structural_path(snapshot, node))
}

fn id_selector(id: &str) -> String {
    if is_plain_ident(id) {
        format!("#{id}")
    } else {
        format!("[id={}]", quote_attr_value(id))
    }
}

fn is_unique(snapshot: &DomSnapshot, selector: &str, node: NodeId) -> bool {
    matches!(query_selector_all(snapshot, selector).as_deref(), Ok([only]) if *only == node)
}

/// `tag:nth-of-type(n)` segments joined by `>`, anchored at the nearest
/// ancestor with a unique id or at the document root.
fn structural_path(snapshot: &DomSnapshot, node: NodeId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        let Some(dom) = snapshot.node(id) else {
            break;
        };
        if id != node {
            if let Some(anchor) = dom.attr_non_empty("id") {
                let anchor = id_selector(anchor);
                if is_unique(snapshot, &anchor, id) {
                    segments.push(anchor);
                    break;
                }
            }
        }
        if dom.parent.is_none() {
            segments.push(dom.tag.clone());
        } else {
            segments.push(format!("{}:nth-of-type({})", dom.tag, snapshot.nth_of_type(id)));
        }
        current = dom.parent;
    }
    segments.reverse();
    segments.join(" > ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeSpec;
    use crate::selector::query_selector_all;

    fn assert_unique(snapshot: &DomSnapshot, node: usize, expected: &str) {
        let selector = unique_selector(snapshot, NodeId(node)).unwrap();
        assert_eq!(selector, expected);
        assert_eq!(
            query_selector_all(snapshot, &selector).unwrap(),
            vec![NodeId(node)]
        );
    }

    #[test]
    fn prefers_unique_id() {
        let snap = DomSnapshot::from_root(
            NodeSpec::new("body").child(NodeSpec::new("button").attr("id", "compose")),
        );
        assert_unique(&snap, 1, "#compose");
    }

    #[test]
    fn falls_back_to_identifying_attributes() {
        let snap = DomSnapshot::from_root(
            NodeSpec::new("body")
                .child(NodeSpec::new("button").attr("id", "dup").attr("aria-label", "Send"))
                .child(NodeSpec::new("button").attr("id", "dup").attr("aria-label", "Discard")),
        );
        assert_unique(&snap, 1, r#"[aria-label="Send"]"#);
    }

    #[test]
    fn uses_classes_when_attributes_are_ambiguous() {
        let snap = DomSnapshot::from_root(
            NodeSpec::new("body")
                .child(NodeSpec::new("a").attr("class", "nav-link active"))
                .child(NodeSpec::new("a").attr("class", "nav-link")),
        );
        assert_unique(&snap, 1, "a.nav-link.active");
    }

    #[test]
    fn builds_structural_path_as_last_resort() {
        let snap = DomSnapshot::from_root(
            NodeSpec::new("body").child(
                NodeSpec::new("div")
                    .attr("id", "panel")
                    .child(NodeSpec::new("span"))
                    .child(NodeSpec::new("span")),
            ),
        );
        assert_unique(&snap, 3, "#panel > span:nth-of-type(2)");

        let bare = DomSnapshot::from_root(
            NodeSpec::new("body")
                .child(NodeSpec::new("div").child(NodeSpec::new("input")))
                .child(NodeSpec::new("div").child(NodeSpec::new("input"))),
        );
        assert_unique(&bare, 4, "body > div:nth-of-type(2) > input:nth-of-type(1)");
    }
}
