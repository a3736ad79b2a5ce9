//! Suppression state for the engine's own strip mutations.
//!
//! While a move session runs, the ids it repositions are "managed": their
//! echoed move/attach/detach events update physical bookkeeping but must
//! not re-trigger tree mutation. Entries carry deadlines so an aborted
//! session cannot suppress reconciliation forever. Pending-child intents
//! pre-classify a creation the engine asked for, with the same time bound.

use crate::protocol::PendingChildIntent;
use crate::types::{TabId, WindowId};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Ids under an open managed-move window
#[derive(Debug)]
pub struct ManagedMoves {
    deadlines: HashMap<TabId, Instant>,
    window: Duration,
}

impl ManagedMoves {
    pub fn new(window: Duration) -> Self {
        Self {
            deadlines: HashMap::new(),
            window,
        }
    }

    /// Open the managed window for `ids`.
    pub fn begin(&mut self, ids: &[TabId]) {
        let deadline = Instant::now() + self.window;
        for id in ids {
            self.deadlines.insert(*id, deadline);
        }
    }

    /// Close the managed window for everything. Sessions are serial, so a
    /// completed session owns every open entry.
    pub fn end_all(&mut self) {
        self.deadlines.clear();
    }

    /// Whether `id` is currently managed. Expired entries drop out here.
    pub fn is_managed(&mut self, id: TabId) -> bool {
        match self.deadlines.get(&id) {
            Some(deadline) if Instant::now() < *deadline => true,
            Some(_) => {
                self.deadlines.remove(&id);
                debug!(tab = id, "managed window expired before explicit end");
                false
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

/// Announced creations awaiting their native event
#[derive(Debug, Default)]
pub struct PendingChildren {
    pending: Vec<(Instant, PendingChildIntent)>,
}

impl PendingChildren {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an announced creation for `ttl`.
    pub fn announce(&mut self, intent: PendingChildIntent, ttl: Duration) {
        self.pending.push((Instant::now() + ttl, intent));
    }

    /// Take the intent matching a creation at (container, index), if any
    /// is still live.
    pub fn claim(&mut self, container: WindowId, flat_index: usize) -> Option<PendingChildIntent> {
        self.sweep();
        let position = self.pending.iter().position(|(_, intent)| {
            intent.container_id == container && intent.expected_flat_index == flat_index
        })?;
        Some(self.pending.remove(position).1)
    }

    fn sweep(&mut self) {
        let now = Instant::now();
        self.pending.retain(|(deadline, intent)| {
            let live = now < *deadline;
            if !live {
                debug!(
                    container = intent.container_id,
                    parent = intent.parent_id,
                    "pending child intent expired unclaimed"
                );
            }
            live
        });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
