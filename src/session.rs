//! Move session lifecycle.
//!
//! One session brackets the flat moves of a single drop: announce the
//! tree delta, mark the movers managed, issue the moves one at a time,
//! close the managed window. Every ack wait is bounded by the configured
//! timeout and a session proceeds on expiry rather than stalling the
//! drop, logged at warn.

use crate::bridge::{IntentSink, TabStrip};
use crate::error::EngineError;
use crate::managed::ManagedMoves;
use crate::protocol::{EndManagedMove, IntentMove, MoveIntent, StartManagedMove};
use crate::sequence::PlannedMove;
use crate::types::{RequestId, TabId, WindowId};
use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Lifecycle stage of a move session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Announced,
    Managing,
}

/// Coordinates one drop's announcements and flat moves.
///
/// Callers drive it in order: `announce`, `start_managed`, `execute`,
/// `finish`. `finish` must run even when `execute` fails so the managed
/// marks never outlive their session.
pub struct MoveSession<'a> {
    sink: &'a dyn IntentSink,
    managed: &'a RwLock<ManagedMoves>,
    ack_timeout: Duration,
    request_id: RequestId,
    state: SessionState,
}

impl<'a> MoveSession<'a> {
    pub fn new(
        sink: &'a dyn IntentSink,
        managed: &'a RwLock<ManagedMoves>,
        request_id: RequestId,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            sink,
            managed,
            ack_timeout,
            request_id,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Announce the tree delta ahead of any flat move.
    pub async fn announce(&mut self, moves: Vec<IntentMove>) -> Result<(), EngineError> {
        debug_assert_eq!(self.state, SessionState::Idle);
        let count = moves.len();
        let intent = MoveIntent {
            request_id: self.request_id,
            moves,
        };
        info!(
            request_id = self.request_id,
            moves = count,
            "announcing move intent"
        );
        match timeout(self.ack_timeout, self.sink.send_move_intent(intent)).await {
            Ok(Ok(ack)) => {
                if ack.request_id != self.request_id {
                    warn!(
                        request_id = self.request_id,
                        acked = ack.request_id,
                        "ack names a different request"
                    );
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => warn!(
                request_id = self.request_id,
                "move intent ack timed out; proceeding"
            ),
        }
        self.state = SessionState::Announced;
        Ok(())
    }

    /// Mark the movers managed and open the managed window.
    ///
    /// Marks are set before the announcement goes out so echoes are
    /// suppressed even when events race the ack.
    pub async fn start_managed(&mut self, ids: &[TabId]) -> Result<(), EngineError> {
        debug_assert_eq!(self.state, SessionState::Announced);
        self.managed.write().begin(ids);
        self.state = SessionState::Managing;
        let msg = StartManagedMove { ids: ids.to_vec() };
        match timeout(self.ack_timeout, self.sink.start_managed_move(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => warn!(
                request_id = self.request_id,
                "managed-move ack timed out; proceeding"
            ),
        }
        Ok(())
    }

    /// Issue the planned flat moves strictly one at a time, in order.
    pub async fn execute(
        &mut self,
        strip: &dyn TabStrip,
        window: WindowId,
        ops: &[PlannedMove],
    ) -> Result<usize, EngineError> {
        debug_assert_eq!(self.state, SessionState::Managing);
        let mut issued = 0;
        for op in ops {
            debug!(
                request_id = self.request_id,
                id = op.id,
                to_index = op.to_index,
                window,
                "issuing flat move"
            );
            strip.move_tab(op.id, window, op.to_index).await?;
            issued += 1;
        }
        Ok(issued)
    }

    /// Close the managed window and clear the marks.
    ///
    /// Marks are cleared unconditionally, even when the closing message
    /// fails to send.
    pub async fn finish(mut self) -> Result<(), EngineError> {
        let mut result = Ok(());
        if self.state == SessionState::Managing {
            let wait = timeout(
                self.ack_timeout,
                self.sink.end_managed_move(EndManagedMove::default()),
            );
            match wait.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => result = Err(e),
                Err(_) => warn!(request_id = self.request_id, "end-managed ack timed out"),
            }
            self.managed.write().end_all();
        }
        self.state = SessionState::Idle;
        debug!(request_id = self.request_id, "session closed");
        result
    }
}
