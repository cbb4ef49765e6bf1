//! Fix attempts and remediation outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard upper bound on automatic fix attempts per finding
pub const MAX_ATTEMPTS: usize = 3;

/// Result of one strategy application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixOutcome {
    /// Re-validation no longer reports the finding
    Fixed,
    /// Strategy applied cleanly but the finding is still reported
    Partial,
    /// Strategy errored, timed out, or re-validation could not run
    Failed,
}

impl FixOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixOutcome::Fixed => "FIXED",
            FixOutcome::Partial => "PARTIAL",
            FixOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for FixOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One iteration of the fix loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixAttempt {
    /// 1-based
    pub iteration: usize,
    pub strategy: String,
    pub outcome: FixOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl FixAttempt {
    pub fn new(iteration: usize, strategy: impl Into<String>, outcome: FixOutcome) -> Self {
        Self {
            iteration,
            strategy: strategy.into(),
            outcome,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Lifecycle of a finding under remediation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemediationState {
    /// Not yet handled
    Pending,
    Fixed,
    /// Handed to a human; never retried automatically
    Escalated,
}

impl RemediationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationState::Pending => "PENDING",
            RemediationState::Fixed => "FIXED",
            RemediationState::Escalated => "ESCALATED",
        }
    }
}

impl fmt::Display for RemediationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of `fix`: always FIXED or ESCALATED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationResult {
    pub fingerprint: String,
    pub state: RemediationState,
    pub attempts: Vec<FixAttempt>,
    /// Why the finding was escalated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RemediationResult {
    pub fn fixed(fingerprint: String, attempts: Vec<FixAttempt>) -> Self {
        Self {
            fingerprint,
            state: RemediationState::Fixed,
            attempts,
            reason: None,
        }
    }

    pub fn escalated(fingerprint: String, attempts: Vec<FixAttempt>, reason: impl Into<String>) -> Self {
        Self {
            fingerprint,
            state: RemediationState::Escalated,
            attempts,
            reason: Some(reason.into()),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.state == RemediationState::Fixed
    }

    pub fn is_escalated(&self) -> bool {
        self.state == RemediationState::Escalated
    }
}
