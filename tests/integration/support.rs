//! Shared fakes and fixtures for engine integration tests.

use async_trait::async_trait;
use canopy::bridge::{IntentSink, NewWindow, TabStrip};
use canopy::config::CanopyConfig;
use canopy::engine::TreeEngine;
use canopy::error::EngineError;
use canopy::protocol::{
    EndManagedMove, IntentAck, MoveIntent, NativeEvent, PendingChildIntent, StartManagedMove,
};
use canopy::store::TabStore;
use canopy::tree::TabRecord;
use canopy::types::{TabId, WindowId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Browser-strip stand-in. Applies each call to its own flat lists and
/// feeds the echo events straight back into the engine, the way the real
/// event queue interleaves them with an in-flight session.
pub struct FakeStrip {
    windows: Mutex<BTreeMap<WindowId, Vec<TabId>>>,
    pub echoes: Mutex<Vec<NativeEvent>>,
    engine: Mutex<Option<Weak<TreeEngine>>>,
    next_window: Mutex<WindowId>,
    next_tab: Mutex<TabId>,
    pub fail_moves_after: Mutex<Option<usize>>,
    moves_issued: Mutex<usize>,
}

impl FakeStrip {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            windows: Mutex::new(BTreeMap::new()),
            echoes: Mutex::new(Vec::new()),
            engine: Mutex::new(None),
            next_window: Mutex::new(100),
            next_tab: Mutex::new(1000),
            fail_moves_after: Mutex::new(None),
            moves_issued: Mutex::new(0),
        })
    }

    pub fn attach_engine(&self, engine: &Arc<TreeEngine>) {
        *self.engine.lock() = Some(Arc::downgrade(engine));
    }

    pub fn seed(&self, window: WindowId, order: &[TabId]) {
        self.windows.lock().insert(window, order.to_vec());
    }

    pub fn order(&self, window: WindowId) -> Vec<TabId> {
        self.windows
            .lock()
            .get(&window)
            .cloned()
            .unwrap_or_default()
    }

    fn deliver(&self, events: Vec<NativeEvent>) {
        let engine = self.engine.lock().as_ref().and_then(Weak::upgrade);
        for event in events {
            self.echoes.lock().push(event.clone());
            if let Some(engine) = &engine {
                engine.handle_event(&event);
            }
        }
    }

    fn find(&self, id: TabId) -> Option<(WindowId, usize)> {
        let windows = self.windows.lock();
        for (window, members) in windows.iter() {
            if let Some(at) = members.iter().position(|m| *m == id) {
                return Some((*window, at));
            }
        }
        None
    }

    fn created_node(id: TabId, window: WindowId, index: usize) -> TabRecord {
        TabRecord {
            id,
            parent_id: None,
            order_key: String::new(),
            container_id: Some(window),
            flat_index: index,
            collapsed: false,
            title: None,
        }
    }
}

#[async_trait]
impl TabStrip for FakeStrip {
    async fn move_tab(
        &self,
        id: TabId,
        window: WindowId,
        to_index: usize,
    ) -> Result<(), EngineError> {
        {
            let mut issued = self.moves_issued.lock();
            if let Some(limit) = *self.fail_moves_after.lock() {
                if *issued >= limit {
                    return Err(EngineError::Transport("strip rejected move".to_string()));
                }
            }
            *issued += 1;
        }
        let (old_window, old_index) = self.find(id).ok_or(EngineError::UnknownTab(id))?;
        let mut events = Vec::new();
        {
            let mut windows = self.windows.lock();
            if old_window == window {
                let members = windows.get_mut(&window).unwrap();
                members.remove(old_index);
                let at = to_index.min(members.len());
                members.insert(at, id);
                events.push(NativeEvent::Moved {
                    id,
                    from_index: old_index,
                    to_index: at,
                    container_id: window,
                });
            } else {
                let old_members = windows.get_mut(&old_window).unwrap();
                old_members.remove(old_index);
                if old_members.is_empty() {
                    windows.remove(&old_window);
                }
                events.push(NativeEvent::Detached {
                    id,
                    old_container_id: old_window,
                    old_index,
                });
                let members = windows.entry(window).or_default();
                let at = to_index.min(members.len());
                members.insert(at, id);
                events.push(NativeEvent::Attached {
                    id,
                    new_container_id: window,
                    new_index: at,
                });
            }
        }
        self.deliver(events);
        Ok(())
    }

    async fn create_window(&self) -> Result<NewWindow, EngineError> {
        let window = {
            let mut next = self.next_window.lock();
            *next += 1;
            *next
        };
        let placeholder = {
            let mut next = self.next_tab.lock();
            *next += 1;
            *next
        };
        self.windows.lock().insert(window, vec![placeholder]);
        self.deliver(vec![NativeEvent::Created {
            node: Self::created_node(placeholder, window, 0),
        }]);
        Ok(NewWindow {
            window,
            placeholder,
        })
    }

    async fn remove_tab(&self, id: TabId) -> Result<(), EngineError> {
        let (window, index) = self.find(id).ok_or(EngineError::UnknownTab(id))?;
        {
            let mut windows = self.windows.lock();
            let members = windows.get_mut(&window).unwrap();
            members.remove(index);
            if members.is_empty() {
                windows.remove(&window);
            }
        }
        self.deliver(vec![NativeEvent::Removed {
            id,
            container_id: window,
        }]);
        Ok(())
    }

    async fn create_tab(&self, window: WindowId) -> Result<TabId, EngineError> {
        let id = {
            let mut next = self.next_tab.lock();
            *next += 1;
            *next
        };
        let index = {
            let mut windows = self.windows.lock();
            let members = windows.entry(window).or_default();
            members.push(id);
            members.len() - 1
        };
        self.deliver(vec![NativeEvent::Created {
            node: Self::created_node(id, window, index),
        }]);
        Ok(id)
    }
}

/// Records every message; acks immediately unless told to hang.
#[derive(Default)]
pub struct FakeSink {
    pub intents: Mutex<Vec<MoveIntent>>,
    pub started: Mutex<Vec<Vec<TabId>>>,
    pub ended: Mutex<usize>,
    pub pending: Mutex<Vec<PendingChildIntent>>,
    pub hang_intent_ack: bool,
}

#[async_trait]
impl IntentSink for FakeSink {
    async fn send_move_intent(&self, intent: MoveIntent) -> Result<IntentAck, EngineError> {
        if self.hang_intent_ack {
            let () = std::future::pending().await;
        }
        let request_id = intent.request_id;
        self.intents.lock().push(intent);
        Ok(IntentAck { request_id })
    }

    async fn start_managed_move(&self, msg: StartManagedMove) -> Result<(), EngineError> {
        self.started.lock().push(msg.ids);
        Ok(())
    }

    async fn end_managed_move(&self, _msg: EndManagedMove) -> Result<(), EngineError> {
        *self.ended.lock() += 1;
        Ok(())
    }

    async fn send_pending_child(&self, intent: PendingChildIntent) -> Result<(), EngineError> {
        self.pending.lock().push(intent);
        Ok(())
    }
}

pub fn record(
    id: TabId,
    parent: Option<TabId>,
    key: &str,
    window: WindowId,
    index: usize,
) -> TabRecord {
    TabRecord {
        id,
        parent_id: parent,
        order_key: key.to_string(),
        container_id: Some(window),
        flat_index: index,
        collapsed: false,
        title: None,
    }
}

/// Engine wired to the fakes, store and strip seeded from `records`.
pub fn engine_with(
    records: Vec<TabRecord>,
    config: &CanopyConfig,
    strip: &Arc<FakeStrip>,
    sink: &Arc<FakeSink>,
) -> Arc<TreeEngine> {
    let store = TabStore::from_records(records);
    for window in store.window_ids() {
        strip.seed(window, &store.window_order(window));
    }
    let engine = Arc::new(TreeEngine::with_store(
        strip.clone(),
        sink.clone(),
        config,
        store,
    ));
    strip.attach_engine(&engine);
    engine
}
