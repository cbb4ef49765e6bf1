//! Warden: Governance Runtime for Multi-Agent Workspaces
//!
//! Keeps a single agent identity active per workspace, checks every
//! privileged action against declared capabilities, runs pluggable validators
//! with compound escalation, and drives a bounded auto-remediation loop that
//! hands unresolved findings to a human.

pub mod audit;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod logging;
pub mod remediation;
pub mod scope;
pub mod session;
pub mod store;
pub mod tooling;
pub mod types;

pub use error::{GovernanceError, Result};
