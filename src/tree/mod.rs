//! Logical tab tree built from flat records.
//!
//! Records arrive unordered from the external system; the builder groups
//! them by parent, sorts sibling groups by order key, and produces a forest
//! deterministic in the record content alone. Records pointing at unknown
//! parents root themselves, and records trapped in a parent cycle surface
//! as trailing roots. A tab never silently vanishes from the logical view.

pub mod flatten;

use crate::types::{OrderKey, TabId, WindowId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Flat record for one tab, the shape persisted and exchanged externally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    pub id: TabId,
    /// Parent tab, None for roots
    pub parent_id: Option<TabId>,
    /// Sibling position under the parent
    pub order_key: OrderKey,
    /// Containing window, None while detached
    pub container_id: Option<WindowId>,
    /// Last known physical position in the container
    pub flat_index: usize,
    pub collapsed: bool,
    /// Local display override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One node of the built forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub record: TabRecord,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn id(&self) -> TabId {
        self.record.id
    }

    /// Ids of this node and every descendant, pre-order
    pub fn preorder_ids(&self) -> Vec<TabId> {
        let mut out = Vec::new();
        self.collect_preorder(&mut out);
        out
    }

    fn collect_preorder(&self, out: &mut Vec<TabId>) {
        out.push(self.record.id);
        for child in &self.children {
            child.collect_preorder(out);
        }
    }
}

/// Sibling order: order key first, id as the stable tie break
fn sibling_order(a: &TabRecord, b: &TabRecord) -> std::cmp::Ordering {
    a.order_key.cmp(&b.order_key).then(a.id.cmp(&b.id))
}

/// Build the forest for one set of records.
pub fn build_tree(records: &[TabRecord]) -> Vec<TreeNode> {
    let ids: HashSet<TabId> = records.iter().map(|r| r.id).collect();

    let mut children_of: HashMap<Option<TabId>, Vec<&TabRecord>> = HashMap::new();
    for record in records {
        let parent = record
            .parent_id
            .filter(|p| *p != record.id && ids.contains(p));
        children_of.entry(parent).or_default().push(record);
    }
    for group in children_of.values_mut() {
        group.sort_by(|a, b| sibling_order(a, b));
    }

    let mut visited: HashSet<TabId> = HashSet::new();
    let mut roots = Vec::new();
    for record in children_of.get(&None).cloned().unwrap_or_default() {
        if let Some(node) = attach(record, &children_of, &mut visited) {
            roots.push(node);
        }
    }

    // Anything still unvisited sits in a parent cycle; surface it rather
    // than dropping it.
    let mut trapped: Vec<&TabRecord> = records
        .iter()
        .filter(|r| !visited.contains(&r.id))
        .collect();
    trapped.sort_by(|a, b| sibling_order(a, b));
    for record in trapped {
        if visited.contains(&record.id) {
            continue;
        }
        if let Some(node) = attach(record, &children_of, &mut visited) {
            roots.push(node);
        }
    }

    roots
}

fn attach(
    record: &TabRecord,
    children_of: &HashMap<Option<TabId>, Vec<&TabRecord>>,
    visited: &mut HashSet<TabId>,
) -> Option<TreeNode> {
    if !visited.insert(record.id) {
        return None;
    }
    let mut node = TreeNode {
        record: record.clone(),
        children: Vec::new(),
    };
    if let Some(kids) = children_of.get(&Some(record.id)) {
        for kid in kids {
            if let Some(child) = attach(kid, children_of, visited) {
                node.children.push(child);
            }
        }
    }
    Some(node)
}

/// Index records by id for parent-chain walks.
pub fn index_records(records: &[TabRecord]) -> HashMap<TabId, &TabRecord> {
    records.iter().map(|r| (r.id, r)).collect()
}

/// Ancestor ids of `id`, nearest first. Stops at unknown parents and cycles.
pub fn ancestor_chain(index: &HashMap<TabId, &TabRecord>, id: TabId) -> Vec<TabId> {
    let mut chain = Vec::new();
    let mut seen: HashSet<TabId> = HashSet::new();
    seen.insert(id);
    let mut cursor = index.get(&id).and_then(|r| r.parent_id);
    while let Some(parent) = cursor {
        if !seen.insert(parent) {
            break;
        }
        chain.push(parent);
        cursor = index.get(&parent).and_then(|r| r.parent_id);
    }
    chain
}

/// Whether `id` sits anywhere below `ancestor`.
pub fn is_descendant_of(
    index: &HashMap<TabId, &TabRecord>,
    id: TabId,
    ancestor: TabId,
) -> bool {
    ancestor_chain(index, id).contains(&ancestor)
}

/// Locate the node for `id` anywhere in the forest.
pub fn find_node<'a>(roots: &'a [TreeNode], id: TabId) -> Option<&'a TreeNode> {
    for root in roots {
        if root.record.id == id {
            return Some(root);
        }
        if let Some(found) = find_node(&root.children, id) {
            return Some(found);
        }
    }
    None
}
