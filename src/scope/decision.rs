//! Permission decisions returned by scope checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a scope check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Allowed,
    Blocked,
    /// Permitted but not declared in the agent's allow-list
    Warned,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "ALLOWED",
            Outcome::Blocked => "BLOCKED",
            Outcome::Warned => "WARNED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule that produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    GlobalBlock,
    Exclusivity,
    DenyList,
    UndeclaredAction,
    AllowList,
    /// Agent declares no allow-list at all
    OpenScope,
    UnknownAgent,
    NoActiveAgent,
}

/// Result of a single scope check. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub agent_id: String,
    pub action: String,
    pub outcome: Outcome,
    pub rule: DecisionRule,
    pub reason: String,
    /// Identity authorized instead, for exclusivity blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<String>,
}

impl PermissionDecision {
    pub fn is_allowed(&self) -> bool {
        self.outcome == Outcome::Allowed
    }

    pub fn is_blocked(&self) -> bool {
        self.outcome == Outcome::Blocked
    }

    pub fn is_warned(&self) -> bool {
        self.outcome == Outcome::Warned
    }

    /// Process exit code a host hook should use: 2 aborts, 0 passes through
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            Outcome::Blocked => 2,
            Outcome::Allowed | Outcome::Warned => 0,
        }
    }
}

impl fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} for '{}': {}",
            self.outcome, self.action, self.agent_id, self.reason
        )
    }
}
