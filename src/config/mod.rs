//! Configuration
//!
//! Layered configuration: built-in defaults, the global file
//! (`$XDG_CONFIG_HOME/warden/config.toml`), the workspace file
//! (`<workspace>/warden.toml`), then `WARDEN__SECTION__KEY` environment
//! variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod workspace;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::{DescriptorsConfig, SessionConfig, StatePaths};

use crate::audit::{CommandValidatorConfig, CompoundRule, OrchestratorConfig, DEFAULT_AUDIT_ACTION};
use crate::error::GovernanceError;
use crate::logging::LoggingConfig;
use crate::remediation::{CommandStrategyConfig, DEFAULT_ATTEMPT_TIMEOUT};
use crate::scope::DEFAULT_GLOBALLY_BLOCKED;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub descriptors: DescriptorsConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub scope: ScopeConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub remediation: RemediationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_globally_blocked() -> Vec<String> {
    DEFAULT_GLOBALLY_BLOCKED.iter().map(|s| s.to_string()).collect()
}

/// Scope enforcement settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Actions blocked for every agent. Replaces the built-in set when given.
    #[serde(default = "default_globally_blocked")]
    pub globally_blocked: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            globally_blocked: default_globally_blocked(),
        }
    }
}

fn default_high_threshold() -> usize {
    3
}

fn default_validator_timeout_ms() -> u64 {
    30_000
}

fn default_required_action() -> String {
    DEFAULT_AUDIT_ACTION.to_string()
}

/// Audit settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// HIGH findings tolerated before the verdict is FAIL
    #[serde(default = "default_high_threshold")]
    pub high_threshold: usize,

    #[serde(default = "default_validator_timeout_ms")]
    pub validator_timeout_ms: u64,

    /// Action the requesting agent must be allowed to perform
    #[serde(default = "default_required_action")]
    pub required_action: String,

    #[serde(default)]
    pub validators: Vec<CommandValidatorConfig>,

    #[serde(default)]
    pub compound_rules: Vec<CompoundRule>,
}

impl AuditConfig {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            validator_timeout: Duration::from_millis(self.validator_timeout_ms),
            high_threshold: self.high_threshold,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            high_threshold: default_high_threshold(),
            validator_timeout_ms: default_validator_timeout_ms(),
            required_action: default_required_action(),
            validators: Vec::new(),
            compound_rules: Vec::new(),
        }
    }
}

fn default_attempt_timeout_ms() -> u64 {
    DEFAULT_ATTEMPT_TIMEOUT.as_millis() as u64
}

/// Remediation settings. The attempt bound itself is not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationConfig {
    #[serde(default)]
    pub strategies: Vec<CommandStrategyConfig>,

    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl RemediationConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl WardenConfig {
    /// Reject configurations that would make a bound unbounded or a lookup ambiguous.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        let mut errors = Vec::new();

        if self.session.history_limit == 0 {
            errors.push("session.history_limit must be at least 1".to_string());
        }
        if self.audit.validator_timeout_ms == 0 {
            errors.push("audit.validator_timeout_ms must be greater than 0".to_string());
        }
        if self.remediation.attempt_timeout_ms == 0 {
            errors.push("remediation.attempt_timeout_ms must be greater than 0".to_string());
        }
        if self.audit.required_action.trim().is_empty() {
            errors.push("audit.required_action cannot be empty".to_string());
        }

        let mut ids = HashSet::new();
        for validator in &self.audit.validators {
            if validator.id.trim().is_empty() || validator.command.trim().is_empty() {
                errors.push("audit validators need both id and command".to_string());
            } else if !ids.insert(validator.id.as_str()) {
                errors.push(format!("duplicate audit validator id '{}'", validator.id));
            }
        }

        for rule in &self.audit.compound_rules {
            if let Err(e) = rule.validate() {
                errors.push(e);
            }
        }

        let mut names = HashSet::new();
        for strategy in &self.remediation.strategies {
            if strategy.name.trim().is_empty() || strategy.command.trim().is_empty() {
                errors.push("remediation strategies need both name and command".to_string());
            } else if !names.insert(strategy.name.as_str()) {
                errors.push(format!("duplicate remediation strategy '{}'", strategy.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::ConfigError(errors.join("; ")))
        }
    }

    /// Resolve descriptor and state locations for `workspace_root`
    pub fn state_paths(&self, workspace_root: &Path) -> Result<StatePaths, GovernanceError> {
        StatePaths::resolve(&self.descriptors, &self.session, workspace_root)
    }
}
