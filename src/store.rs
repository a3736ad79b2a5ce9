//! Tab store: the flat records plus per-container physical orders.
//!
//! The store is the single shared mutable resource. The engine owns it
//! behind a lock and is the only writer; algorithms take record snapshots.
//! Physical window lists model what the external strip holds, so moving a
//! tab here follows the same remove-then-insert semantics the strip uses.

use crate::keys::validate_key;
use crate::tree::flatten::flatten_all;
use crate::tree::{build_tree, TabRecord};
use crate::types::{OrderKey, TabId, WindowId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Record store plus denormalized physical bookkeeping
#[derive(Debug, Clone, Default)]
pub struct TabStore {
    tabs: HashMap<TabId, TabRecord>,
    windows: BTreeMap<WindowId, Vec<TabId>>,
}

impl TabStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from exported records. Physical orders come from the
    /// recorded flat indexes, with ids as the tie break.
    pub fn from_records(records: Vec<TabRecord>) -> Self {
        let mut store = Self::new();
        let mut by_window: BTreeMap<WindowId, Vec<(usize, TabId)>> = BTreeMap::new();
        for record in records {
            if let Some(window) = record.container_id {
                by_window
                    .entry(window)
                    .or_default()
                    .push((record.flat_index, record.id));
            }
            store.tabs.insert(record.id, record);
        }
        for (window, mut members) in by_window {
            members.sort_unstable();
            store
                .windows
                .insert(window, members.into_iter().map(|(_, id)| id).collect());
            store.reindex(window);
        }
        store
    }

    pub fn get(&self, id: TabId) -> Option<&TabRecord> {
        self.tabs.get(&id)
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.tabs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TabRecord> {
        self.tabs.values()
    }

    /// Physical order snapshot for one container
    pub fn window_order(&self, window: WindowId) -> Vec<TabId> {
        self.windows.get(&window).cloned().unwrap_or_default()
    }

    /// Records currently assigned to one container, unordered
    pub fn window_records(&self, window: WindowId) -> Vec<TabRecord> {
        self.tabs
            .values()
            .filter(|r| r.container_id == Some(window))
            .cloned()
            .collect()
    }

    /// All records: windows in order with their physical sequence, then
    /// detached records by id. The persistence hand-off shape.
    pub fn export(&self) -> Vec<TabRecord> {
        let mut out = Vec::with_capacity(self.tabs.len());
        for members in self.windows.values() {
            for id in members {
                if let Some(record) = self.tabs.get(id) {
                    out.push(record.clone());
                }
            }
        }
        let mut detached: Vec<&TabRecord> = self
            .tabs
            .values()
            .filter(|r| r.container_id.is_none())
            .collect();
        detached.sort_by_key(|r| r.id);
        out.extend(detached.into_iter().cloned());
        out
    }

    /// Insert a new tab. When the record names a container, the id also
    /// joins that container's physical list at `index` (clamped).
    pub fn insert_tab(&mut self, mut record: TabRecord, index: usize) {
        let id = record.id;
        if let Some(window) = record.container_id {
            let members = self.windows.entry(window).or_default();
            let at = index.min(members.len());
            members.insert(at, id);
            record.flat_index = at;
            self.tabs.insert(id, record);
            self.reindex(window);
        } else {
            self.tabs.insert(id, record);
        }
    }

    /// Remove a tab entirely.
    pub fn remove_tab(&mut self, id: TabId) -> Option<TabRecord> {
        let record = self.tabs.remove(&id)?;
        if let Some(window) = record.container_id {
            if let Some(members) = self.windows.get_mut(&window) {
                members.retain(|member| *member != id);
            }
            self.reindex(window);
        }
        Some(record)
    }

    /// Take a tab out of its container's physical list, keeping the record.
    pub fn detach_tab(&mut self, id: TabId) -> bool {
        let Some(window) = self.tabs.get(&id).and_then(|r| r.container_id) else {
            return false;
        };
        if let Some(members) = self.windows.get_mut(&window) {
            members.retain(|member| *member != id);
        }
        if let Some(record) = self.tabs.get_mut(&id) {
            record.container_id = None;
        }
        self.reindex(window);
        true
    }

    /// Put a tab into a container's physical list at `index` (clamped).
    pub fn attach_tab(&mut self, id: TabId, window: WindowId, index: usize) -> bool {
        if !self.tabs.contains_key(&id) {
            return false;
        }
        // Leave any stale membership first.
        self.detach_tab(id);
        if let Some(record) = self.tabs.get_mut(&id) {
            record.container_id = Some(window);
        }
        let members = self.windows.entry(window).or_default();
        let at = index.min(members.len());
        members.insert(at, id);
        self.reindex(window);
        true
    }

    /// Reposition a tab within its container, remove-then-insert.
    pub fn move_tab_in_window(&mut self, id: TabId, to_index: usize) -> bool {
        let Some(window) = self.tabs.get(&id).and_then(|r| r.container_id) else {
            return false;
        };
        let Some(members) = self.windows.get_mut(&window) else {
            return false;
        };
        let Some(from) = members.iter().position(|member| *member == id) else {
            return false;
        };
        members.remove(from);
        let at = to_index.min(members.len());
        members.insert(at, id);
        self.reindex(window);
        true
    }

    /// Drop a container and every tab in it.
    pub fn remove_window(&mut self, window: WindowId) -> Vec<TabId> {
        let members = self.windows.remove(&window).unwrap_or_default();
        for id in &members {
            self.tabs.remove(id);
        }
        members
    }

    /// Tree-slot update: parent and order key.
    pub fn set_parent_key(&mut self, id: TabId, parent: Option<TabId>, key: OrderKey) -> bool {
        match self.tabs.get_mut(&id) {
            Some(record) => {
                record.parent_id = parent;
                record.order_key = key;
                true
            }
            None => false,
        }
    }

    /// Container assignment on the record only; physical lists are updated
    /// by attach/detach bookkeeping when the echoes arrive.
    pub fn set_container(&mut self, id: TabId, window: Option<WindowId>) -> bool {
        match self.tabs.get_mut(&id) {
            Some(record) => {
                record.container_id = window;
                true
            }
            None => false,
        }
    }

    pub fn set_collapsed(&mut self, id: TabId, collapsed: bool) -> bool {
        match self.tabs.get_mut(&id) {
            Some(record) => {
                record.collapsed = collapsed;
                true
            }
            None => false,
        }
    }

    pub fn set_title(&mut self, id: TabId, title: Option<String>) -> bool {
        match self.tabs.get_mut(&id) {
            Some(record) => {
                record.title = title;
                true
            }
            None => false,
        }
    }

    fn reindex(&mut self, window: WindowId) {
        let Some(members) = self.windows.get(&window) else {
            return;
        };
        let members = members.clone();
        if members.is_empty() {
            self.windows.remove(&window);
            return;
        }
        for (position, id) in members.iter().enumerate() {
            if let Some(record) = self.tabs.get_mut(id) {
                record.flat_index = position;
            }
        }
    }

    /// Invariant report: empty when the store is consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut listed: HashSet<TabId> = HashSet::new();

        for (window, members) in &self.windows {
            for (position, id) in members.iter().enumerate() {
                if !listed.insert(*id) {
                    violations.push(format!("tab {} listed in more than one container", id));
                }
                match self.tabs.get(id) {
                    None => violations.push(format!(
                        "container {} lists unknown tab {}",
                        window, id
                    )),
                    Some(record) => {
                        if record.container_id != Some(*window) {
                            violations.push(format!(
                                "tab {} listed in container {} but assigned to {:?}",
                                id, window, record.container_id
                            ));
                        }
                        if record.flat_index != position {
                            violations.push(format!(
                                "tab {} flat index {} disagrees with position {}",
                                id, record.flat_index, position
                            ));
                        }
                    }
                }
            }
        }

        for record in self.tabs.values() {
            if let Some(window) = record.container_id {
                if !self
                    .windows
                    .get(&window)
                    .is_some_and(|members| members.contains(&record.id))
                {
                    violations.push(format!(
                        "tab {} assigned to container {} but not listed there",
                        record.id, window
                    ));
                }
            }
            if validate_key(&record.order_key).is_err() {
                violations.push(format!(
                    "tab {} carries invalid order key '{}'",
                    record.id, record.order_key
                ));
            }
            if self.has_parent_cycle(record.id) {
                violations.push(format!("parent cycle involving tab {}", record.id));
            }
        }

        // Physical order restricted to pre-order traversal must equal tree
        // order within every container.
        for (window, members) in &self.windows {
            let records = self.window_records(*window);
            let tree_order: Vec<TabId> = flatten_all(&build_tree(&records))
                .into_iter()
                .map(|row| row.id)
                .collect();
            if &tree_order != members {
                violations.push(format!(
                    "container {} physical order diverges from tree order",
                    window
                ));
            }
        }

        violations
    }

    fn has_parent_cycle(&self, id: TabId) -> bool {
        let mut seen: HashSet<TabId> = HashSet::new();
        seen.insert(id);
        let mut cursor = self.tabs.get(&id).and_then(|r| r.parent_id);
        while let Some(parent) = cursor {
            if !seen.insert(parent) {
                return true;
            }
            cursor = self.tabs.get(&parent).and_then(|r| r.parent_id);
        }
        false
    }
}
