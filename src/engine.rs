//! Command surface of the tab-tree engine.
//!
//! Every command snapshots the store, computes its whole plan from the
//! snapshot, applies the optimistic tree delta, then drives the move
//! session. Physical window lists change only when the external system
//! echoes the moves back through `handle_event`; the tree fields lead
//! and the strip catches up.

use crate::bridge::{IntentSink, NewWindow, TabStrip};
use crate::config::{CanopyConfig, ProtocolConfig};
use crate::error::{DropError, EngineError};
use crate::keys::{key_between, FIRST_KEY};
use crate::managed::{ManagedMoves, PendingChildren};
use crate::placement::{normalize_selection, resolve_drop, DropTarget, Placement};
use crate::protocol::{IntentMove, NativeEvent, PendingChildIntent};
use crate::reconcile;
use crate::sequence::{move_unit, plan_inserts, plan_moves, PlannedMove};
use crate::session::MoveSession;
use crate::store::TabStore;
use crate::tree::flatten::{flatten, flatten_all, FlatNode};
use crate::tree::{build_tree, find_node, TabRecord};
use crate::types::{RequestId, TabId, WindowId};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

/// Outcome of a drop command.
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub request_id: RequestId,
    pub window: WindowId,
    /// Every id that travelled: the movers and their descendants, pre-order.
    pub moved: Vec<TabId>,
    /// Flat move calls actually issued; ids already in place cost nothing.
    pub issued: usize,
}

/// The engine owning the tree state and driving the external strip.
pub struct TreeEngine {
    store: Arc<RwLock<TabStore>>,
    managed: Arc<RwLock<ManagedMoves>>,
    pending: Arc<RwLock<PendingChildren>>,
    strip: Arc<dyn TabStrip>,
    sink: Arc<dyn IntentSink>,
    protocol: ProtocolConfig,
    next_request: AtomicU64,
}

impl TreeEngine {
    pub fn new(strip: Arc<dyn TabStrip>, sink: Arc<dyn IntentSink>, config: &CanopyConfig) -> Self {
        Self::with_store(strip, sink, config, TabStore::new())
    }

    /// Start from an already-populated store, e.g. a session restore.
    pub fn with_store(
        strip: Arc<dyn TabStrip>,
        sink: Arc<dyn IntentSink>,
        config: &CanopyConfig,
        store: TabStore,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            managed: Arc::new(RwLock::new(ManagedMoves::new(config.protocol.managed_window()))),
            pending: Arc::new(RwLock::new(PendingChildren::new())),
            strip,
            sink,
            protocol: config.protocol.clone(),
            next_request: AtomicU64::new(0),
        }
    }

    fn next_request_id(&self) -> RequestId {
        self.next_request.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Apply a drag-and-drop of `selection` onto `target` in `window`.
    ///
    /// The selection may live in `window` already or arrive from other
    /// containers; descendants travel with their selected ancestors.
    pub async fn apply_drop(
        &self,
        window: WindowId,
        selection: &[TabId],
        target: DropTarget,
    ) -> Result<MoveReport, EngineError> {
        self.run_drop(window, selection, target, None).await
    }

    /// Move the selection into a fresh container.
    ///
    /// The external system opens every new container with a placeholder
    /// tab; it is closed again once the movers are in place, before the
    /// managed window ends.
    pub async fn move_to_new_window(&self, selection: &[TabId]) -> Result<MoveReport, EngineError> {
        {
            let store = self.store.read();
            for id in selection {
                if !store.contains(*id) {
                    return Err(EngineError::UnknownTab(*id));
                }
            }
        }
        let NewWindow {
            window,
            placeholder,
        } = self.strip.create_window().await?;
        info!(window, placeholder, "created container for selection");
        {
            // The created event may have beaten us to it.
            let mut store = self.store.write();
            if !store.contains(placeholder) {
                let record = TabRecord {
                    id: placeholder,
                    parent_id: None,
                    order_key: FIRST_KEY.to_string(),
                    container_id: Some(window),
                    flat_index: 0,
                    collapsed: false,
                    title: None,
                };
                store.insert_tab(record, 0);
            }
        }
        // Movers land after the placeholder, which then disappears.
        self.run_drop(window, selection, DropTarget::Gap(1), Some(placeholder))
            .await
    }

    async fn run_drop(
        &self,
        window: WindowId,
        selection: &[TabId],
        target: DropTarget,
        placeholder: Option<TabId>,
    ) -> Result<MoveReport, EngineError> {
        let (all_records, current, window_known) = {
            let store = self.store.read();
            for id in selection {
                if !store.contains(*id) {
                    return Err(EngineError::UnknownTab(*id));
                }
            }
            (
                store.export(),
                store.window_order(window),
                store.window_ids().contains(&window),
            )
        };
        if !window_known {
            return Err(EngineError::UnknownWindow(window));
        }

        let movers = normalize_selection(&all_records, selection);
        if movers.is_empty() {
            return Err(DropError::EmptySelection.into());
        }
        let plan = plan_drop(&all_records, &current, window, &movers, &target)?;

        // Optimistic tree delta; the physical lists wait for echoes.
        {
            let mut store = self.store.write();
            for (mover, key) in movers.iter().zip(plan.placement.keys.iter()) {
                store.set_parent_key(*mover, plan.placement.parent, key.clone());
            }
            for id in &plan.unit {
                store.set_container(*id, Some(window));
            }
        }

        let request_id = self.next_request_id();
        let intents: Vec<IntentMove> = movers
            .iter()
            .zip(plan.placement.keys.iter())
            .map(|(id, key)| IntentMove {
                id: *id,
                parent_id: plan.placement.parent,
                order_key: key.clone(),
            })
            .collect();

        let mut session = MoveSession::new(
            self.sink.as_ref(),
            &self.managed,
            request_id,
            self.protocol.ack_timeout(),
        );
        let outcome = async {
            session.announce(intents).await?;
            session.start_managed(&plan.unit).await?;
            let issued = session.execute(self.strip.as_ref(), window, &plan.ops).await?;
            if let Some(ph) = placeholder {
                self.strip.remove_tab(ph).await?;
                self.store.write().remove_tab(ph);
            }
            Ok::<usize, EngineError>(issued)
        }
        .await;
        let finished = session.finish().await;

        let issued = outcome?;
        finished?;
        info!(
            request_id,
            window,
            moved = plan.unit.len(),
            issued,
            "drop applied"
        );
        Ok(MoveReport {
            request_id,
            window,
            moved: plan.unit,
            issued,
        })
    }

    /// Open a new tab as the last child of `parent`.
    ///
    /// The placement is announced before the tab exists so the created
    /// event can be claimed and adopted instead of landing as a root.
    pub async fn open_child(&self, parent: TabId) -> Result<TabId, EngineError> {
        let intent = {
            let store = self.store.read();
            let record = store.get(parent).ok_or(EngineError::UnknownTab(parent))?;
            let window = record.container_id.ok_or(EngineError::Floating(parent))?;
            let records = store.window_records(window);
            let roots = build_tree(&records);
            let rows = flatten_all(&roots);
            let at = rows
                .iter()
                .position(|row| row.id == parent)
                .ok_or(EngineError::UnknownTab(parent))?;
            let subtree_len = find_node(&roots, parent)
                .map(|node| node.preorder_ids().len())
                .unwrap_or(1);
            let last_child_key = records
                .iter()
                .filter(|r| r.parent_id == Some(parent))
                .max_by(|a, b| (&a.order_key, a.id).cmp(&(&b.order_key, b.id)))
                .map(|r| r.order_key.clone());
            PendingChildIntent {
                container_id: window,
                expected_flat_index: at + subtree_len,
                parent_id: parent,
                order_key: key_between(last_child_key.as_deref(), None)?,
            }
        };

        let wait = timeout(
            self.protocol.ack_timeout(),
            self.sink.send_pending_child(intent.clone()),
        );
        match wait.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => warn!(parent, "pending-child ack timed out; proceeding"),
        }
        let window = intent.container_id;
        self.pending
            .write()
            .announce(intent, self.protocol.pending_child_ttl());

        let id = self.strip.create_tab(window).await?;
        info!(parent, child = id, window, "opened child tab");
        Ok(id)
    }

    /// Close a tab. A collapsed tab takes its hidden subtree with it; an
    /// expanded tab closes alone and its children are promoted when the
    /// removal echoes back.
    pub async fn close(&self, id: TabId) -> Result<usize, EngineError> {
        let victims: Vec<TabId> = {
            let store = self.store.read();
            let record = store.get(id).ok_or(EngineError::UnknownTab(id))?;
            match (record.collapsed, record.container_id) {
                (true, Some(window)) => {
                    let roots = build_tree(&store.window_records(window));
                    find_node(&roots, id)
                        .map(|node| node.preorder_ids())
                        .unwrap_or_else(|| vec![id])
                }
                _ => vec![id],
            }
        };
        for victim in &victims {
            self.strip.remove_tab(*victim).await?;
        }
        info!(tab = id, closed = victims.len(), "close issued");
        Ok(victims.len())
    }

    /// Set or clear the local display title.
    pub fn rename(&self, id: TabId, title: Option<String>) -> Result<(), EngineError> {
        if self.store.write().set_title(id, title) {
            Ok(())
        } else {
            Err(EngineError::UnknownTab(id))
        }
    }

    /// Flip the collapsed flag; returns the new state.
    pub fn toggle_collapse(&self, id: TabId) -> Result<bool, EngineError> {
        let mut store = self.store.write();
        let collapsed = store
            .get(id)
            .map(|r| r.collapsed)
            .ok_or(EngineError::UnknownTab(id))?;
        store.set_collapsed(id, !collapsed);
        Ok(!collapsed)
    }

    /// Feed one native event through reconciliation.
    pub fn handle_event(&self, event: &NativeEvent) {
        let mut store = self.store.write();
        let mut managed = self.managed.write();
        let mut pending = self.pending.write();
        reconcile::apply_event(&mut store, &mut managed, &mut pending, event);
    }

    /// Rows the overlay shows: collapsed subtrees stay hidden.
    pub fn visible_rows(&self, window: WindowId) -> Vec<FlatNode> {
        let store = self.store.read();
        flatten(&build_tree(&store.window_records(window)))
    }

    /// Every row in physical order, collapsed or not.
    pub fn all_rows(&self, window: WindowId) -> Vec<FlatNode> {
        let store = self.store.read();
        flatten_all(&build_tree(&store.window_records(window)))
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.store.read().window_ids()
    }

    pub fn export_records(&self) -> Vec<TabRecord> {
        self.store.read().export()
    }

    pub fn validation_report(&self) -> Vec<String> {
        self.store.read().validate()
    }

    pub fn store_handle(&self) -> Arc<RwLock<TabStore>> {
        Arc::clone(&self.store)
    }
}

struct DropPlan {
    placement: Placement,
    unit: Vec<TabId>,
    ops: Vec<PlannedMove>,
}

/// Compute the placement, the travelling unit, and the flat ops for one
/// drop, entirely from snapshots.
///
/// Movers already in the container are resequenced in place; movers from
/// elsewhere are inserted at ascending desired positions after the
/// in-place pass, which lands them exactly.
fn plan_drop(
    all_records: &[TabRecord],
    current: &[TabId],
    window: WindowId,
    movers: &[TabId],
    target: &DropTarget,
) -> Result<DropPlan, EngineError> {
    let dest_records: Vec<TabRecord> = all_records
        .iter()
        .filter(|r| r.container_id == Some(window))
        .cloned()
        .collect();
    let placement = resolve_drop(&dest_records, movers, target)?;
    let unit = move_unit(all_records, movers);
    let unit_set: HashSet<TabId> = unit.iter().copied().collect();

    let mut desired_records: Vec<TabRecord> = all_records
        .iter()
        .filter(|r| r.container_id == Some(window) || unit_set.contains(&r.id))
        .cloned()
        .collect();
    for record in desired_records.iter_mut() {
        if let Some(at) = movers.iter().position(|m| *m == record.id) {
            record.parent_id = placement.parent;
            record.order_key = placement.keys[at].clone();
        }
        if unit_set.contains(&record.id) {
            record.container_id = Some(window);
        }
    }
    let desired: Vec<TabId> = flatten_all(&build_tree(&desired_records))
        .into_iter()
        .map(|row| row.id)
        .collect();

    let current_set: HashSet<TabId> = current.iter().copied().collect();
    let locals: Vec<TabId> = unit
        .iter()
        .copied()
        .filter(|id| current_set.contains(id))
        .collect();
    let arrivals: Vec<TabId> = unit
        .iter()
        .copied()
        .filter(|id| !current_set.contains(id))
        .collect();
    let desired_locals: Vec<TabId> = desired
        .iter()
        .copied()
        .filter(|id| current_set.contains(id))
        .collect();

    let mut ops = plan_moves(current, &desired_locals, &locals)?;
    ops.extend(plan_inserts(&desired, &arrivals)?);
    Ok(DropPlan {
        placement,
        unit,
        ops,
    })
}
