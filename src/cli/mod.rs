//! Command-line interface for dynq.
//!
//! Provides commands for pushing work, activating queues into groups,
//! draining groups with workers, and inspecting group state.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
