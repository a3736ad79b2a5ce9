//! Core types for the canopy tab-tree engine.

/// TabId: Identifier the external system assigns to a tab, stable across moves
pub type TabId = u32;

/// WindowId: Identifier of a tab-strip container (a browser window)
pub type WindowId = u32;

/// OrderKey: Base-62 fractional-indexing key, ordered by plain byte comparison
pub type OrderKey = String;

/// RequestId: Correlation id for intent/ack exchanges
pub type RequestId = u64;
