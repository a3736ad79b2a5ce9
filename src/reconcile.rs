//! External event reconciliation.
//!
//! Applies one native event at a time, in delivery order. Echoes of the
//! engine's own moves (managed ids) update physical bookkeeping only; real
//! external changes additionally repair the tree so the invariants hold
//! again. Failures are contained per event: the store is never left
//! half-mutated beyond the ids the event names, and the stream continues.

use crate::error::KeyError;
use crate::keys::{key_between, keys_between, FIRST_KEY};
use crate::managed::{ManagedMoves, PendingChildren};
use crate::protocol::NativeEvent;
use crate::store::TabStore;
use crate::tree::TabRecord;
use crate::types::{OrderKey, TabId, WindowId};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Apply one event against the store under the current suppression state.
pub fn apply_event(
    store: &mut TabStore,
    managed: &mut ManagedMoves,
    pending: &mut PendingChildren,
    event: &NativeEvent,
) {
    match event {
        NativeEvent::Created { node } => on_created(store, pending, node.clone()),
        NativeEvent::Removed { id, container_id } => on_removed(store, *id, *container_id),
        NativeEvent::Moved {
            id,
            to_index,
            container_id,
            ..
        } => on_moved(store, managed, *id, *to_index, *container_id),
        NativeEvent::Detached { id, .. } => on_detached(store, managed, *id),
        NativeEvent::Attached {
            id,
            new_container_id,
            new_index,
        } => on_attached(store, managed, *id, *new_container_id, *new_index),
        NativeEvent::ContainerRemoved { container_id } => {
            let dropped = store.remove_window(*container_id);
            info!(
                container = container_id,
                tabs = dropped.len(),
                "container removed with its tabs"
            );
        }
    }
}

fn on_created(store: &mut TabStore, pending: &mut PendingChildren, mut node: TabRecord) {
    if store.contains(node.id) {
        debug!(tab = node.id, "created event for known tab ignored");
        return;
    }
    let index = node.flat_index;
    if let Some(window) = node.container_id {
        if let Some(intent) = pending.claim(window, index) {
            if store.contains(intent.parent_id) {
                debug!(
                    tab = node.id,
                    parent = intent.parent_id,
                    "creation matched a pending child intent"
                );
                node.parent_id = Some(intent.parent_id);
                node.order_key = intent.order_key;
            } else {
                warn!(
                    tab = node.id,
                    parent = intent.parent_id,
                    "pending child intent names a missing parent, rooting instead"
                );
                node.parent_id = None;
                node.order_key = root_key_at(store, window, index);
            }
        } else {
            node.parent_id = None;
            node.order_key = root_key_at(store, window, index);
        }
    }
    debug!(tab = node.id, container = ?node.container_id, index, "tab created");
    store.insert_tab(node, index);
}

fn on_removed(store: &mut TabStore, id: TabId, _container: WindowId) {
    let Some(snapshot) = store.get(id).cloned() else {
        debug!(tab = id, "removed event for unknown tab ignored");
        return;
    };
    if snapshot.collapsed {
        // A collapsed subtree closes as a unit.
        let subtree = subtree_ids(store, id);
        info!(tab = id, descendants = subtree.len() - 1, "collapsed tab removed, cascading");
        for member in subtree {
            store.remove_tab(member);
        }
        return;
    }
    store.remove_tab(id);
    promote_children(store, &snapshot);
    debug!(tab = id, "tab removed, children promoted");
}

fn on_moved(
    store: &mut TabStore,
    managed: &mut ManagedMoves,
    id: TabId,
    to_index: usize,
    container: WindowId,
) {
    let Some(snapshot) = store.get(id).cloned() else {
        debug!(tab = id, "moved event for unknown tab ignored");
        return;
    };
    // Physical bookkeeping happens for managed and unmanaged moves alike.
    if snapshot.container_id == Some(container) {
        store.move_tab_in_window(id, to_index);
    } else {
        store.attach_tab(id, container, to_index);
    }
    if managed.is_managed(id) {
        debug!(tab = id, to_index, "managed move echo, bookkeeping only");
        return;
    }
    // The strip moved one tab; its children stayed put, so promote them
    // before inferring the tab's new slot from its new neighbors.
    promote_children(store, &snapshot);
    reslot_from_neighbors(store, id);
    debug!(tab = id, to_index, "external move reconciled");
}

fn on_detached(store: &mut TabStore, managed: &mut ManagedMoves, id: TabId) {
    let Some(snapshot) = store.get(id).cloned() else {
        debug!(tab = id, "detached event for unknown tab ignored");
        return;
    };
    store.detach_tab(id);
    if managed.is_managed(id) {
        debug!(tab = id, "managed detach echo, bookkeeping only");
        return;
    }
    promote_children(store, &snapshot);
    // Containerless until the matching attach; keeps its key.
    store.set_parent_key(id, None, snapshot.order_key);
    debug!(tab = id, "external detach reconciled");
}

fn on_attached(
    store: &mut TabStore,
    managed: &mut ManagedMoves,
    id: TabId,
    container: WindowId,
    index: usize,
) {
    if !store.contains(id) {
        debug!(tab = id, "attached event for unknown tab ignored");
        return;
    }
    store.attach_tab(id, container, index);
    if managed.is_managed(id) {
        debug!(tab = id, container, "managed attach echo, bookkeeping only");
        return;
    }
    reslot_from_neighbors(store, id);
    debug!(tab = id, container, index, "external attach reconciled");
}

/// Root-level key for a creation at physical `index` in `window`: between
/// the roots bracketing that position.
fn root_key_at(store: &TabStore, window: WindowId, index: usize) -> OrderKey {
    let order = store.window_order(window);
    let at = index.min(order.len());
    let left = order[..at]
        .iter()
        .rev()
        .find_map(|id| root_ancestor_key(store, *id));
    let right = order[at..]
        .iter()
        .filter_map(|id| store.get(*id))
        .find(|r| r.parent_id.is_none())
        .map(|r| r.order_key.clone());
    match key_between(left.as_deref(), right.as_deref()) {
        Ok(key) => key,
        Err(error) => {
            warn!(%error, window, index, "root key allocation failed, using zero key");
            FIRST_KEY.to_string()
        }
    }
}

/// Key of the root-level ancestor (or self) of `id`.
fn root_ancestor_key(store: &TabStore, id: TabId) -> Option<OrderKey> {
    let mut seen: HashSet<TabId> = HashSet::new();
    let mut cursor = id;
    loop {
        if !seen.insert(cursor) {
            return None;
        }
        let record = store.get(cursor)?;
        match record.parent_id {
            None => return Some(record.order_key.clone()),
            Some(parent) if store.contains(parent) => cursor = parent,
            Some(_) => return Some(record.order_key.clone()),
        }
    }
}

/// Every id in the subtree rooted at `root`, the root included.
fn subtree_ids(store: &TabStore, root: TabId) -> Vec<TabId> {
    let mut out = vec![root];
    let mut cursor = 0;
    while cursor < out.len() {
        let parent = out[cursor];
        cursor += 1;
        let mut kids: Vec<&TabRecord> = store
            .iter()
            .filter(|r| r.parent_id == Some(parent) && !out.contains(&r.id))
            .collect();
        kids.sort_by(|a, b| a.order_key.cmp(&b.order_key).then(a.id.cmp(&b.id)));
        out.extend(kids.into_iter().map(|r| r.id));
    }
    out
}

/// Re-parent the children of a vacated slot to its former parent, keyed
/// into the gap the slot leaves behind.
fn promote_children(store: &mut TabStore, vacated: &TabRecord) {
    let mut children: Vec<(TabId, OrderKey)> = store
        .iter()
        .filter(|r| r.parent_id == Some(vacated.id))
        .map(|r| (r.id, r.order_key.clone()))
        .collect();
    if children.is_empty() {
        return;
    }
    children.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    let right = next_sibling_key(store, vacated);
    match keys_between(Some(&vacated.order_key), right.as_deref(), children.len()) {
        Ok(keys) => {
            for ((child, _), key) in children.into_iter().zip(keys) {
                store.set_parent_key(child, vacated.parent_id, key);
            }
        }
        Err(error) => {
            // Keep the old keys; relative order still resolves via the
            // id tie break.
            warn!(%error, vacated = vacated.id, "promotion re-key failed, keeping child keys");
            for (child, key) in children {
                store.set_parent_key(child, vacated.parent_id, key);
            }
        }
    }
}

/// First sibling key after `of` within its parent group.
fn next_sibling_key(store: &TabStore, of: &TabRecord) -> Option<OrderKey> {
    store
        .iter()
        .filter(|r| {
            r.id != of.id
                && r.parent_id == of.parent_id
                && r.container_id == of.container_id
        })
        .filter(|r| {
            (r.order_key.as_str(), r.id) > (of.order_key.as_str(), of.id)
        })
        .min_by(|a, b| a.order_key.cmp(&b.order_key).then(a.id.cmp(&b.id)))
        .map(|r| r.order_key.clone())
}

/// Infer a tab's tree slot from its physical neighbors and apply it.
fn reslot_from_neighbors(store: &mut TabStore, id: TabId) {
    let Some(record) = store.get(id).cloned() else {
        return;
    };
    let Some(window) = record.container_id else {
        return;
    };
    let order = store.window_order(window);
    let Some(position) = order.iter().position(|member| *member == id) else {
        return;
    };
    let prev = position.checked_sub(1).map(|p| order[p]);
    let next = order.get(position + 1).copied();

    match infer_slot(store, prev, next) {
        Ok((parent, key)) => {
            store.set_parent_key(id, parent, key);
        }
        Err(error) => {
            warn!(%error, tab = id, "slot inference failed, rooting at tail");
            let last_root = store
                .window_records(window)
                .iter()
                .filter(|r| r.parent_id.is_none() && r.id != id)
                .map(|r| r.order_key.clone())
                .max();
            let key = key_between(last_root.as_deref(), None)
                .unwrap_or_else(|_| FIRST_KEY.to_string());
            store.set_parent_key(id, None, key);
        }
    }
}

fn infer_slot(
    store: &TabStore,
    prev: Option<TabId>,
    next: Option<TabId>,
) -> Result<(Option<TabId>, OrderKey), KeyError> {
    let Some(prev) = prev else {
        // First physical slot: first root.
        let right = next.and_then(|n| root_ancestor_key(store, n));
        return Ok((None, key_between(None, right.as_deref())?));
    };
    let prev_record = match store.get(prev) {
        Some(record) => record.clone(),
        None => return Ok((None, key_between(None, None)?)),
    };
    if let Some(next) = next {
        if let Some(next_record) = store.get(next) {
            if next_record.parent_id == Some(prev) {
                // Slot between a tab and its first child.
                return Ok((
                    Some(prev),
                    key_between(None, Some(&next_record.order_key))?,
                ));
            }
            if let Some(anchor) = self_or_ancestor_with_parent(store, prev, next_record.parent_id)
            {
                let left = store.get(anchor).map(|r| r.order_key.clone());
                return Ok((
                    next_record.parent_id,
                    key_between(left.as_deref(), Some(&next_record.order_key))?,
                ));
            }
        }
    }
    // No follower, or inconsistent neighbors: append after the preceding
    // tab's chain at its level.
    let right = next_sibling_key(store, &prev_record);
    Ok((
        prev_record.parent_id,
        key_between(Some(&prev_record.order_key), right.as_deref())?,
    ))
}

/// `start` or its nearest ancestor whose parent is `parent`.
fn self_or_ancestor_with_parent(
    store: &TabStore,
    start: TabId,
    parent: Option<TabId>,
) -> Option<TabId> {
    let mut seen: HashSet<TabId> = HashSet::new();
    let mut cursor = start;
    loop {
        if !seen.insert(cursor) {
            return None;
        }
        let record = store.get(cursor)?;
        if record.parent_id == parent {
            return Some(cursor);
        }
        cursor = record.parent_id?;
    }
}
