//! Tooling & Integration Layer
//!
//! CLI surface used by operators and by host hooks that translate decisions
//! into process exit codes.

pub mod cli;
pub mod format;

pub use cli::{AgentCommands, Cli, CliContext, CommandOutput, Commands};
