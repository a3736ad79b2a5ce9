//! Error types for the canopy tab-tree engine.
//!
//! Pure modules (keys, tree, placement, sequence) raise only on contract
//! violations. The engine wraps them and adds transport-level failures;
//! reconciliation failures are contained per event and never surface here.

use crate::types::{TabId, WindowId};
use thiserror::Error;

/// Order key allocation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("malformed order key '{0}'")]
    MalformedKey(String),

    #[error("left key '{left}' is not below right key '{right}'")]
    InvertedRange { left: String, right: String },

    #[error("order key space exhausted")]
    Exhausted,
}

/// Drop resolution errors. An invalid drop rejects without mutating anything.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DropError {
    #[error("drop target {0} does not exist")]
    TargetMissing(TabId),

    #[error("drop would make {0} a descendant of itself")]
    WouldCycle(TabId),

    #[error("selection is empty after normalization")]
    EmptySelection,

    #[error("gap position {position} exceeds root count {roots}")]
    GapOutOfRange { position: usize, roots: usize },

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Move sequencing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("current and desired orders disagree on membership")]
    IdSets,

    #[error("moving id {0} is absent from the desired order")]
    UnknownMover(TabId),

    #[error("desired order reorders ids outside the moving set")]
    NonMoverReordered,

    #[error("planned moves do not reproduce the desired order")]
    Diverged,
}

/// Engine-level errors surfaced to command callers
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown tab {0}")]
    UnknownTab(TabId),

    #[error("unknown container {0}")]
    UnknownWindow(WindowId),

    #[error("tab {0} is not in any container")]
    Floating(TabId),

    #[error(transparent)]
    Drop(#[from] DropError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}
