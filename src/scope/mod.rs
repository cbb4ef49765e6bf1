//! Scope Enforcement
//!
//! Every privileged action is checked against the requesting agent's declared
//! capabilities before it runs. Outcomes are data: a blocked action is a
//! `BLOCKED` decision carrying the rule that fired, never an error.

pub mod decision;
pub mod enforcer;

pub use decision::{DecisionRule, Outcome, PermissionDecision};
pub use enforcer::{ScopeEnforcer, DEFAULT_GLOBALLY_BLOCKED};
