//! External collaborator contracts.
//!
//! Traits for the two systems the engine drives: the message transport
//! carrying intents to the authoritative event source, and the flat tab
//! strip accepting single-item moves. Implementations live outside this
//! crate; tests substitute fakes.

use crate::error::EngineError;
use crate::protocol::{
    EndManagedMove, IntentAck, MoveIntent, PendingChildIntent, StartManagedMove,
};
use crate::types::{TabId, WindowId};
use async_trait::async_trait;

/// A freshly created container and the placeholder tab the external
/// system insists on opening it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewWindow {
    pub window: WindowId,
    pub placeholder: TabId,
}

/// Intent channel to the authoritative event source.
///
/// Send methods resolve when the transport structurally confirms
/// delivery; the engine bounds every wait and proceeds on timeout.
#[async_trait]
pub trait IntentSink: Send + Sync {
    /// Announce a tree delta ahead of its flat moves.
    async fn send_move_intent(&self, intent: MoveIntent) -> Result<IntentAck, EngineError>;

    /// Open the managed window for the listed ids.
    async fn start_managed_move(&self, msg: StartManagedMove) -> Result<(), EngineError>;

    /// Close the managed window.
    async fn end_managed_move(&self, msg: EndManagedMove) -> Result<(), EngineError>;

    /// Pre-declare the parent and key of a tab about to be created.
    async fn send_pending_child(&self, intent: PendingChildIntent) -> Result<(), EngineError>;
}

/// The flat, externally-owned tab strip.
#[async_trait]
pub trait TabStrip: Send + Sync {
    /// Single-item move: remove, shift, insert at `to_index`.
    async fn move_tab(
        &self,
        id: TabId,
        window: WindowId,
        to_index: usize,
    ) -> Result<(), EngineError>;

    /// Create a container; comes with a placeholder tab.
    async fn create_window(&self) -> Result<NewWindow, EngineError>;

    /// Close a tab.
    async fn remove_tab(&self, id: TabId) -> Result<(), EngineError>;

    /// Open a new tab in `window`; the strip appends it at the end.
    async fn create_tab(&self, window: WindowId) -> Result<TabId, EngineError>;
}
