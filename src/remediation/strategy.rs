//! Fix strategies and strategy selection.

use super::attempt::FixAttempt;
use crate::audit::{AuditScope, Finding, Severity};
use crate::error::GovernanceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use tracing::debug;

/// One way of fixing a finding
#[async_trait]
pub trait FixStrategy: Send + Sync {
    /// Unique name; the selector uses it to avoid repeating a strategy
    fn name(&self) -> &str;

    fn applies_to(&self, finding: &Finding) -> bool;

    /// Attempt the fix. `Ok` only means the strategy ran; the engine
    /// re-validates to decide whether the finding is gone.
    async fn apply(&self, finding: &Finding, scope: &AuditScope) -> Result<(), GovernanceError>;
}

/// Picks the next strategy for a finding given what was already tried
pub trait StrategySelector: Send + Sync {
    fn select(
        &self,
        finding: &Finding,
        strategies: &[Arc<dyn FixStrategy>],
        prior: &[FixAttempt],
    ) -> Option<Arc<dyn FixStrategy>>;
}

/// First applicable strategy, in registration order, not yet attempted
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstUntriedSelector;

impl StrategySelector for FirstUntriedSelector {
    fn select(
        &self,
        finding: &Finding,
        strategies: &[Arc<dyn FixStrategy>],
        prior: &[FixAttempt],
    ) -> Option<Arc<dyn FixStrategy>> {
        strategies
            .iter()
            .filter(|s| s.applies_to(finding))
            .find(|s| !prior.iter().any(|a| a.strategy == s.name()))
            .cloned()
    }
}

fn default_min_severity() -> Severity {
    Severity::Low
}

/// Fix command configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStrategyConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Validators whose findings this strategy handles; empty means all
    #[serde(default)]
    pub validators: Vec<String>,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

/// Runs an external fixer with the finding passed through the environment.
///
/// Exposes `WARDEN_FINDING` (the finding as JSON), `WARDEN_FINDING_RESOURCE`,
/// `WARDEN_FINDING_LINE` when known, and `WARDEN_AUDIT_ROOT`. The scope root is
/// the working directory. A non-zero exit fails the attempt.
pub struct CommandStrategy {
    config: CommandStrategyConfig,
}

impl CommandStrategy {
    pub fn new(config: CommandStrategyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FixStrategy for CommandStrategy {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn applies_to(&self, finding: &Finding) -> bool {
        finding.severity >= self.config.min_severity
            && (self.config.validators.is_empty()
                || self.config.validators.iter().any(|v| *v == finding.validator_id))
    }

    async fn apply(&self, finding: &Finding, scope: &AuditScope) -> Result<(), GovernanceError> {
        debug!(strategy = %self.config.name, command = %self.config.command, "Running fix command");
        let finding_json = serde_json::to_string(finding)?;
        let mut command = tokio::process::Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .current_dir(&scope.root)
            .env("WARDEN_AUDIT_ROOT", &scope.root)
            .env("WARDEN_FINDING", finding_json)
            .env("WARDEN_FINDING_RESOURCE", &finding.location.resource)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(line) = finding.location.line {
            command.env("WARDEN_FINDING_LINE", line.to_string());
        }

        let output = command.output().await.map_err(|e| {
            GovernanceError::RemediationError(format!(
                "failed to start '{}': {}",
                self.config.command, e
            ))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GovernanceError::RemediationError(format!(
                "'{}' exited with {}: {}",
                self.config.command,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}
