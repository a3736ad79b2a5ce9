//! Canopy: Hierarchical Tab-Tree State Management
//!
//! Maintains a parent/child tree over a flat, externally-owned browser
//! tab strip. The tree orders siblings with fractional order keys, drops
//! and drags resolve to minimal single-item strip moves, and external
//! strip changes reconcile back into the tree.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod logging;
pub mod managed;
pub mod placement;
pub mod protocol;
pub mod reconcile;
pub mod sequence;
pub mod session;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
