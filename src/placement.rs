//! Drop target resolution.
//!
//! Maps a drag-and-drop target onto a tree mutation: the new parent and one
//! fresh order key per mover. Inputs are the destination container's records
//! plus the normalized mover list; invalid drops reject without touching
//! anything. Movers are treated as vacating their current slots, so their
//! own keys never bound the allocation.

use crate::error::DropError;
use crate::keys::keys_between;
use crate::tree::flatten::flatten_all;
use crate::tree::{build_tree, index_records, is_descendant_of, TabRecord};
use crate::types::{OrderKey, TabId};
use std::collections::{HashMap, HashSet};

/// Where a drag ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Movers become the target's first children
    ChildOf(TabId),
    /// Movers land right after `near`'s ancestor at the `ancestor` level,
    /// as children of `ancestor` (None for root level)
    Sibling { ancestor: Option<TabId>, near: TabId },
    /// Movers become roots at this gap position among remaining roots
    Gap(usize),
    /// Movers become the first roots of a container the caller creates
    NewContainer,
}

/// Resolved tree mutation: one key per mover, in mover order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub parent: Option<TabId>,
    pub keys: Vec<OrderKey>,
}

/// Reduce a selection to its top-level movers in tree order. A selected
/// descendant of another selected node travels with its ancestor anyway.
pub fn normalize_selection(records: &[TabRecord], selection: &[TabId]) -> Vec<TabId> {
    let chosen: HashSet<TabId> = selection.iter().copied().collect();
    let roots = build_tree(records);
    flatten_all(&roots)
        .into_iter()
        .filter(|row| chosen.contains(&row.id) && !row.ancestors.iter().any(|a| chosen.contains(a)))
        .map(|row| row.id)
        .collect()
}

/// Resolve a drop of `movers` onto `target` within one container's records.
pub fn resolve_drop(
    records: &[TabRecord],
    movers: &[TabId],
    target: &DropTarget,
) -> Result<Placement, DropError> {
    if movers.is_empty() {
        return Err(DropError::EmptySelection);
    }
    let index = index_records(records);
    let moving: HashSet<TabId> = movers.iter().copied().collect();

    match target {
        DropTarget::ChildOf(target_id) => {
            if !index.contains_key(target_id) {
                return Err(DropError::TargetMissing(*target_id));
            }
            reject_cycle(&index, &moving, movers, *target_id)?;
            let first_child = siblings_of(records, Some(*target_id), &moving)
                .first()
                .map(|r| r.order_key.clone());
            let keys = keys_between(None, first_child.as_deref(), movers.len())?;
            Ok(Placement {
                parent: Some(*target_id),
                keys,
            })
        }
        DropTarget::Sibling { ancestor, near } => {
            if let Some(anc) = ancestor {
                if !index.contains_key(anc) {
                    return Err(DropError::TargetMissing(*anc));
                }
                reject_cycle(&index, &moving, movers, *anc)?;
            }
            let anchor =
                anchor_at_level(&index, *near, *ancestor).ok_or(DropError::TargetMissing(*near))?;
            let group = siblings_all(records, *ancestor);
            let at = group
                .iter()
                .position(|r| r.id == anchor)
                .ok_or(DropError::TargetMissing(anchor))?;
            // Nearest non-moving neighbors around the anchor bound the keys.
            let left = group[..=at]
                .iter()
                .rev()
                .find(|r| !moving.contains(&r.id))
                .map(|r| r.order_key.clone());
            let right = group[at + 1..]
                .iter()
                .find(|r| !moving.contains(&r.id))
                .map(|r| r.order_key.clone());
            let keys = keys_between(left.as_deref(), right.as_deref(), movers.len())?;
            Ok(Placement {
                parent: *ancestor,
                keys,
            })
        }
        DropTarget::Gap(position) => {
            let roots = siblings_of(records, None, &moving);
            if *position > roots.len() {
                return Err(DropError::GapOutOfRange {
                    position: *position,
                    roots: roots.len(),
                });
            }
            let left = position
                .checked_sub(1)
                .map(|i| roots[i].order_key.clone());
            let right = roots.get(*position).map(|r| r.order_key.clone());
            let keys = keys_between(left.as_deref(), right.as_deref(), movers.len())?;
            Ok(Placement { parent: None, keys })
        }
        DropTarget::NewContainer => {
            // A fresh container has no roots beyond the placeholder the
            // caller is about to discard.
            let keys = keys_between(None, None, movers.len())?;
            Ok(Placement { parent: None, keys })
        }
    }
}

/// A drop is a cycle when the new parent is a mover or sits below one.
fn reject_cycle(
    index: &HashMap<TabId, &TabRecord>,
    moving: &HashSet<TabId>,
    movers: &[TabId],
    new_parent: TabId,
) -> Result<(), DropError> {
    if moving.contains(&new_parent) {
        return Err(DropError::WouldCycle(new_parent));
    }
    if movers
        .iter()
        .any(|m| is_descendant_of(index, new_parent, *m))
    {
        return Err(DropError::WouldCycle(new_parent));
    }
    Ok(())
}

/// Sibling group under `parent`, key-sorted, movers excluded.
fn siblings_of<'a>(
    records: &'a [TabRecord],
    parent: Option<TabId>,
    moving: &HashSet<TabId>,
) -> Vec<&'a TabRecord> {
    let mut group: Vec<&TabRecord> = records
        .iter()
        .filter(|r| r.parent_id == parent && !moving.contains(&r.id))
        .collect();
    group.sort_by(|a, b| a.order_key.cmp(&b.order_key).then(a.id.cmp(&b.id)));
    group
}

/// Sibling group under `parent`, key-sorted, movers included.
fn siblings_all(records: &[TabRecord], parent: Option<TabId>) -> Vec<&TabRecord> {
    let mut group: Vec<&TabRecord> = records.iter().filter(|r| r.parent_id == parent).collect();
    group.sort_by(|a, b| a.order_key.cmp(&b.order_key).then(a.id.cmp(&b.id)));
    group
}

/// `near`'s ancestor-or-self whose parent is `ancestor`. A drop beside a
/// deep node at a shallower level anchors on the relevant ancestor.
fn anchor_at_level(
    index: &HashMap<TabId, &TabRecord>,
    near: TabId,
    ancestor: Option<TabId>,
) -> Option<TabId> {
    let mut seen: HashSet<TabId> = HashSet::new();
    let mut cursor = near;
    loop {
        if !seen.insert(cursor) {
            return None;
        }
        let record = index.get(&cursor)?;
        if record.parent_id == ancestor {
            return Some(cursor);
        }
        cursor = record.parent_id?;
    }
}
