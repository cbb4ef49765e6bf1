//! Validator plugin interface and the external-command validator.

use super::finding::Finding;
use crate::error::GovernanceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::debug;

/// What an audit run looks at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditScope {
    /// Workspace root the validators run against
    pub root: PathBuf,
    /// Optional narrower targets inside the root
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<PathBuf>,
}

impl AuditScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            targets: Vec::new(),
        }
    }

    pub fn with_targets(mut self, targets: Vec<PathBuf>) -> Self {
        self.targets = targets;
        self
    }
}

/// A pluggable analyzer.
///
/// Validators are pure: they read the scope and report findings, with no side
/// effects on the workspace, so the orchestrator may run them concurrently.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable identifier, used to tag findings and in compound rules
    fn id(&self) -> &str;

    async fn run(&self, scope: &AuditScope) -> Result<Vec<Finding>, GovernanceError>;
}

/// External analyzer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandValidatorConfig {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Runs an external analyzer that prints a JSON array of findings on stdout.
///
/// The scope root is the working directory and is also exported as
/// `WARDEN_AUDIT_ROOT`; targets are appended as trailing arguments. A non-zero
/// exit is accepted as long as stdout parses, since many scanners signal
/// "found something" through the exit code.
pub struct CommandValidator {
    config: CommandValidatorConfig,
}

impl CommandValidator {
    pub fn new(config: CommandValidatorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Validator for CommandValidator {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn run(&self, scope: &AuditScope) -> Result<Vec<Finding>, GovernanceError> {
        debug!(validator = %self.config.id, command = %self.config.command, "Running command validator");
        let output = tokio::process::Command::new(&self.config.command)
            .args(&self.config.args)
            .args(&scope.targets)
            .current_dir(&scope.root)
            .env("WARDEN_AUDIT_ROOT", &scope.root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                GovernanceError::ValidatorError(format!(
                    "failed to start '{}': {}",
                    self.config.command, e
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            if output.status.success() {
                return Ok(Vec::new());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GovernanceError::ValidatorError(format!(
                "'{}' exited with {}: {}",
                self.config.command,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_str::<Vec<Finding>>(&stdout).map_err(|e| {
            GovernanceError::ValidatorError(format!(
                "'{}' printed invalid findings JSON: {}",
                self.config.command, e
            ))
        })
    }
}
