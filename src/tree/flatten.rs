//! Depth-first flattening of the built forest.
//!
//! Two traversals share one walker: the visible view stops descending at
//! collapsed nodes (what the UI renders), the physical view visits every
//! node (what the flat tab strip actually holds).

use super::TreeNode;
use crate::types::TabId;

/// One row of the flattened tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatNode {
    pub id: TabId,
    /// Nesting depth, roots at 0
    pub depth: usize,
    /// Last sibling under its parent, for connector rendering
    pub is_last_child: bool,
    /// Ancestor ids, root first
    pub ancestors: Vec<TabId>,
    pub collapsed: bool,
    pub title: Option<String>,
}

/// Visible flatten: collapsed nodes appear, their descendants do not.
pub fn flatten(roots: &[TreeNode]) -> Vec<FlatNode> {
    let mut out = Vec::new();
    let mut ancestors = Vec::new();
    walk(roots, 0, &mut ancestors, true, &mut out);
    out
}

/// Physical flatten: full pre-order, collapse ignored.
pub fn flatten_all(roots: &[TreeNode]) -> Vec<FlatNode> {
    let mut out = Vec::new();
    let mut ancestors = Vec::new();
    walk(roots, 0, &mut ancestors, false, &mut out);
    out
}

fn walk(
    nodes: &[TreeNode],
    depth: usize,
    ancestors: &mut Vec<TabId>,
    respect_collapse: bool,
    out: &mut Vec<FlatNode>,
) {
    let last = nodes.len().saturating_sub(1);
    for (position, node) in nodes.iter().enumerate() {
        out.push(FlatNode {
            id: node.record.id,
            depth,
            is_last_child: position == last,
            ancestors: ancestors.clone(),
            collapsed: node.record.collapsed,
            title: node.record.title.clone(),
        });
        if respect_collapse && node.record.collapsed {
            continue;
        }
        ancestors.push(node.record.id);
        walk(&node.children, depth + 1, ancestors, respect_collapse, out);
        ancestors.pop();
    }
}
