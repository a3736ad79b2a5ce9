//! Tooling & Integration Layer
//!
//! Command-line inspection for tab-tree state: rendering, invariant
//! checks, order-key allocation, and move planning against exported
//! records.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
