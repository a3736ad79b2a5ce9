//! Integration tests for the canopy tab-tree engine.

mod engine_sessions;
mod properties;
mod support;
