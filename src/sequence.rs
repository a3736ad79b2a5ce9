//! Flat move sequencing.
//!
//! The external system accepts only single-item moves with
//! remove-then-insert semantics: the item leaves its slot, everything
//! shifts, then it lands at the target index of the shrunken list. The
//! planner turns a current and a desired flat order into an ordered op
//! list that reproduces the desired order exactly while touching only the
//! ids being moved. Each op's index is computed against the list state
//! after all prior ops.

use crate::error::SequenceError;
use crate::tree::{build_tree, find_node, TabRecord};
use crate::types::TabId;
use std::collections::HashSet;

/// One single-item move against the flat strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMove {
    pub id: TabId,
    pub to_index: usize,
}

/// Everything that travels when `movers` move: each mover followed by its
/// descendants, pre-order. Movers must already be normalized (no mover
/// inside another mover's subtree).
pub fn move_unit(records: &[TabRecord], movers: &[TabId]) -> Vec<TabId> {
    let roots = build_tree(records);
    let mut unit = Vec::new();
    for mover in movers {
        if let Some(node) = find_node(&roots, *mover) {
            unit.extend(node.preorder_ids());
        }
    }
    unit
}

/// Plan single-item moves within one container.
///
/// `current` and `desired` must hold the same ids, `desired` must keep
/// every id outside `moving` in its current relative order, and every
/// moving id must be present. Ops are emitted in execution order; ids
/// already in position produce no op.
pub fn plan_moves(
    current: &[TabId],
    desired: &[TabId],
    moving: &[TabId],
) -> Result<Vec<PlannedMove>, SequenceError> {
    let current_set: HashSet<TabId> = current.iter().copied().collect();
    let desired_set: HashSet<TabId> = desired.iter().copied().collect();
    if current.len() != desired.len()
        || current_set.len() != current.len()
        || desired_set.len() != desired.len()
        || current_set != desired_set
    {
        return Err(SequenceError::IdSets);
    }
    let moving_set: HashSet<TabId> = moving.iter().copied().collect();
    if let Some(missing) = moving.iter().find(|m| !desired_set.contains(m)) {
        return Err(SequenceError::UnknownMover(*missing));
    }

    // Ids outside the moving set must agree on relative order up front;
    // no op sequence that touches only movers can fix a violation.
    let stable_current: Vec<TabId> = current
        .iter()
        .copied()
        .filter(|id| !moving_set.contains(id))
        .collect();
    let stable_desired: Vec<TabId> = desired
        .iter()
        .copied()
        .filter(|id| !moving_set.contains(id))
        .collect();
    if stable_current != stable_desired {
        return Err(SequenceError::NonMoverReordered);
    }

    let mut work: Vec<TabId> = current.to_vec();
    let mut placed: HashSet<TabId> = HashSet::new();
    let mut ops = Vec::new();

    for (position, mover) in desired
        .iter()
        .enumerate()
        .filter(|(_, id)| moving_set.contains(id))
    {
        // Anchor on the nearest desired predecessor that already sits in
        // its final relative position: a non-mover, or a mover placed by an
        // earlier op.
        let anchor = desired[..position]
            .iter()
            .rev()
            .find(|id| !moving_set.contains(id) || placed.contains(id))
            .copied();
        let mut target = match anchor {
            Some(anchor) => {
                work.iter()
                    .position(|id| *id == anchor)
                    .ok_or(SequenceError::Diverged)?
                    + 1
            }
            None => 0,
        };
        let from = work
            .iter()
            .position(|id| id == mover)
            .ok_or(SequenceError::Diverged)?;
        if from < target {
            // Removing the item first shifts the insertion point left.
            target -= 1;
        }
        if from != target {
            ops.push(PlannedMove {
                id: *mover,
                to_index: target,
            });
            work.remove(from);
            work.insert(target, *mover);
        }
        placed.insert(*mover);
    }

    if work != desired {
        return Err(SequenceError::Diverged);
    }
    Ok(ops)
}

/// Plan arrivals into a container the ids are not in yet. Cross-container
/// moves are plain inserts; nothing shifts out from under them as long as
/// they land in ascending desired positions.
pub fn plan_inserts(
    desired: &[TabId],
    moving: &[TabId],
) -> Result<Vec<PlannedMove>, SequenceError> {
    let moving_set: HashSet<TabId> = moving.iter().copied().collect();
    if let Some(missing) = moving
        .iter()
        .find(|m| !desired.iter().any(|id| id == *m))
    {
        return Err(SequenceError::UnknownMover(*missing));
    }
    Ok(desired
        .iter()
        .enumerate()
        .filter(|(_, id)| moving_set.contains(id))
        .map(|(position, id)| PlannedMove {
            id: *id,
            to_index: position,
        })
        .collect())
}

/// Apply one remove-then-insert move to a flat list.
pub fn apply_move(order: &mut Vec<TabId>, op: PlannedMove) {
    if let Some(from) = order.iter().position(|id| *id == op.id) {
        order.remove(from);
        let at = op.to_index.min(order.len());
        order.insert(at, op.id);
    }
}
