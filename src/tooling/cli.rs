//! CLI Tooling
//!
//! Command-line surface for hooks and operators. Every command is
//! workspace-scoped and returns its output plus the exit code a host process
//! should use: 2 for a blocked action or detected identity bleed, 1 for a
//! failed or blocked audit.

use crate::audit::{
    AuditPhase, AuditReport, AuditReportStore, AuditScope, CommandValidator, Finding,
    ValidatorOrchestrator,
};
use crate::config::{ConfigLoader, StatePaths, WardenConfig};
use crate::descriptor::{DescriptorStore, LoadReport};
use crate::error::GovernanceError;
use crate::identity::IdentityGuard;
use crate::remediation::{CommandStrategy, FileEscalationChannel, RemediationEngine, RemediationResult};
use crate::scope::ScopeEnforcer;
use crate::session::FileSessionStore;
use crate::tooling::format;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Warden CLI - governance runtime for multi-agent workspaces
#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Identity isolation, scope enforcement, audits and bounded remediation for agent workspaces")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and validate agent descriptors
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Activate an agent identity for this workspace
    Activate {
        /// Agent id
        agent_id: String,
    },
    /// Clear the active identity
    Deactivate,
    /// Show the current session
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Record activity for the active agent
    Touch {
        /// Current task label
        #[arg(long)]
        task: Option<String>,
    },
    /// Reload descriptors and re-resolve the active identity
    Reload,
    /// Check whether an action is permitted (exit 2 when blocked)
    Check {
        /// Action tag
        action: String,
        /// Agent to check (defaults to the active agent)
        #[arg(long)]
        agent: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List every action an agent is blocked from
    Blocked {
        /// Agent to list (defaults to the active agent)
        #[arg(long)]
        agent: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Check text for claims to act as another agent (exit 2 when found)
    BleedCheck {
        /// Text to check
        text: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run the configured validators (exit 1 on FAIL or BLOCKED)
    Audit {
        /// Directory to audit (defaults to the workspace root)
        #[arg(long)]
        scope: Option<PathBuf>,
        /// Agent requesting the audit (defaults to the active agent)
        #[arg(long)]
        agent: Option<String>,
        /// Attempt bounded remediation of the findings
        #[arg(long)]
        fix: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a stored audit report
    Report {
        /// Run id (defaults to the latest run)
        #[arg(long)]
        run: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List findings escalated for human review
    Escalations {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration after all layers are merged
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// List loaded agents
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one agent descriptor
    Show {
        /// Agent id
        agent_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate descriptors (all, or one agent)
    Validate {
        /// Agent id
        agent_id: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Printed on stdout
    pub text: String,
    /// Printed on stderr, for passthrough warnings
    pub notice: Option<String>,
    pub exit_code: i32,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self {
            text,
            notice: None,
            exit_code: 0,
        }
    }

    fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    fn with_notice(mut self, notice: String) -> Self {
        self.notice = Some(notice);
        self
    }
}

/// CLI context: loaded configuration and the governance components for one workspace
pub struct CliContext {
    workspace_root: PathBuf,
    config: WardenConfig,
    paths: StatePaths,
    descriptors: Arc<DescriptorStore>,
    identity: Arc<IdentityGuard>,
    enforcer: Arc<ScopeEnforcer>,
    load_report: Option<LoadReport>,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, GovernanceError> {
        let config = Self::load_config(&workspace_root, config_path.as_deref())?;
        Self::with_config(workspace_root, config)
    }

    /// Effective configuration: an explicit file, or the layered workspace sources
    pub fn load_config(workspace_root: &Path, config_path: Option<&Path>) -> Result<WardenConfig, GovernanceError> {
        match config_path {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(workspace_root),
        }
    }

    /// Build the context from an already loaded configuration.
    ///
    /// Loads descriptors, so logging should be initialized first.
    pub fn with_config(workspace_root: PathBuf, config: WardenConfig) -> Result<Self, GovernanceError> {
        let paths = config.state_paths(&workspace_root)?;

        let descriptors = Arc::new(DescriptorStore::new());
        let load_report = match descriptors.load(&paths.descriptors) {
            Ok(report) => Some(report),
            Err(GovernanceError::DescriptorDirMissing(dir)) => {
                warn!(directory = %dir.display(), "Descriptor directory missing; no agents loaded");
                None
            }
            Err(e) => return Err(e),
        };

        let session = Arc::new(FileSessionStore::new(paths.session_file.clone()));
        let identity = Arc::new(
            IdentityGuard::new(descriptors.clone(), session)
                .with_history_limit(config.session.history_limit),
        );
        let enforcer = Arc::new(
            ScopeEnforcer::with_global_blocks(descriptors.clone(), &config.scope.globally_blocked)
                .with_identity(identity.clone()),
        );

        Ok(Self {
            workspace_root,
            config,
            paths,
            descriptors,
            identity,
            enforcer,
            load_report,
        })
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    pub fn identity(&self) -> &Arc<IdentityGuard> {
        &self.identity
    }

    pub fn enforcer(&self) -> &Arc<ScopeEnforcer> {
        &self.enforcer
    }

    /// Execute a command
    ///
    /// Descriptors skipped at load are reported in the notice of every command.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, GovernanceError> {
        let mut output = self.dispatch(command)?;
        if let Some(skipped) = self.skipped_notice() {
            output.notice = Some(match output.notice.take() {
                Some(notice) => format!("{}\n{}", skipped, notice),
                None => skipped,
            });
        }
        Ok(output)
    }

    fn skipped_notice(&self) -> Option<String> {
        let report = self.load_report.as_ref()?;
        if report.skipped.is_empty() {
            return None;
        }
        let files: Vec<String> = report
            .skipped
            .iter()
            .map(|s| format!("{} ({})", s.path.display(), s.reason))
            .collect();
        Some(format!(
            "warning: {} agent descriptor(s) skipped: {}",
            report.skipped.len(),
            files.join("; ")
        ))
    }

    fn dispatch(&self, command: &Commands) -> Result<CommandOutput, GovernanceError> {
        match command {
            Commands::Agent { command } => self.handle_agent(command),
            Commands::Activate { agent_id } => {
                let state = self.identity.activate(agent_id)?;
                Ok(CommandOutput::ok(format!(
                    "Activated agent: {}",
                    state.active_agent.as_deref().unwrap_or(agent_id)
                )))
            }
            Commands::Deactivate => {
                let before = self.identity.session().active_agent;
                self.identity.deactivate()?;
                Ok(CommandOutput::ok(match before {
                    Some(agent) => format!("Deactivated agent: {}", agent),
                    None => "No agent was active".to_string(),
                }))
            }
            Commands::Status { format } => self.handle_status(format),
            Commands::Touch { task } => {
                let state = self.identity.touch(task.as_deref())?;
                Ok(CommandOutput::ok(match state.active_agent {
                    Some(agent) => format!("Recorded activity for {}", agent),
                    None => "No agent is active".to_string(),
                }))
            }
            Commands::Reload => self.handle_reload(),
            Commands::Check { action, agent, format } => self.handle_check(action, agent.as_deref(), format),
            Commands::Blocked { agent, format } => self.handle_blocked(agent.as_deref(), format),
            Commands::BleedCheck { text, format } => self.handle_bleed_check(text, format),
            Commands::Audit {
                scope,
                agent,
                fix,
                format,
            } => self.handle_audit(scope.clone(), agent.clone(), *fix, format),
            Commands::Report { run, format } => self.handle_report(run.as_deref(), format),
            Commands::Escalations { format } => {
                let records = FileEscalationChannel::new(&self.paths.escalations).list()?;
                if format == "json" {
                    return Ok(CommandOutput::ok(serde_json::to_string_pretty(&records)?));
                }
                Ok(CommandOutput::ok(format::format_escalations(&records)))
            }
            Commands::Config { format } => {
                let text = if format == "json" {
                    serde_json::to_string_pretty(&self.config)?
                } else {
                    toml::to_string_pretty(&self.config)
                        .map_err(|e| GovernanceError::ConfigError(format!("Failed to render configuration: {}", e)))?
                };
                Ok(CommandOutput::ok(text))
            }
        }
    }

    fn handle_agent(&self, command: &AgentCommands) -> Result<CommandOutput, GovernanceError> {
        match command {
            AgentCommands::List { format } => {
                let descriptors = self.descriptors.all();
                let active = self.identity.current()?.map(|d| d.id.clone());
                if format == "json" {
                    let agents: Vec<serde_json::Value> = descriptors
                        .iter()
                        .map(|d| {
                            json!({
                                "id": d.id,
                                "name": d.name,
                                "can": d.can,
                                "cannot": d.cannot,
                                "exclusive": d.exclusive,
                                "active": active.as_deref() == Some(d.id.as_str()),
                            })
                        })
                        .collect();
                    let output = json!({ "total": agents.len(), "agents": agents });
                    return Ok(CommandOutput::ok(serde_json::to_string_pretty(&output)?));
                }
                Ok(CommandOutput::ok(format::format_agent_list(&descriptors, active.as_deref())))
            }
            AgentCommands::Show { agent_id, format } => {
                let descriptor = self.descriptors.get(agent_id)?;
                if format == "json" {
                    return Ok(CommandOutput::ok(serde_json::to_string_pretty(descriptor.as_ref())?));
                }
                Ok(CommandOutput::ok(format::format_descriptor(&descriptor)))
            }
            AgentCommands::Validate { agent_id, format } => {
                let results = match agent_id {
                    Some(id) => vec![self.descriptors.validate(id)?],
                    None => self.descriptors.validate_all(),
                };
                let valid = results.iter().all(|r| r.is_valid());
                let output = if format == "json" {
                    let entries: Vec<serde_json::Value> = results
                        .iter()
                        .map(|r| {
                            json!({
                                "agent_id": r.agent_id,
                                "valid": r.is_valid(),
                                "checks": r.checks.iter().map(|(c, p)| json!({"check": c, "passed": p})).collect::<Vec<_>>(),
                                "errors": r.errors,
                            })
                        })
                        .collect();
                    let skipped: Vec<serde_json::Value> = self
                        .load_report
                        .iter()
                        .flat_map(|r| r.skipped.iter())
                        .map(|s| json!({"path": s.path, "reason": s.reason}))
                        .collect();
                    serde_json::to_string_pretty(&json!({
                        "valid": valid,
                        "results": entries,
                        "skipped": skipped,
                    }))?
                } else {
                    format::format_validation(&results, self.load_report.as_ref())
                };
                Ok(CommandOutput::ok(output).with_exit_code(if valid { 0 } else { 1 }))
            }
        }
    }

    fn handle_status(&self, format: &str) -> Result<CommandOutput, GovernanceError> {
        // Resolving first drops a stale agent before the state is shown.
        self.identity.current()?;
        let state = self.identity.session();
        if format == "json" {
            return Ok(CommandOutput::ok(serde_json::to_string_pretty(&state)?));
        }
        Ok(CommandOutput::ok(format::format_session(&state)))
    }

    fn handle_reload(&self) -> Result<CommandOutput, GovernanceError> {
        let report = self.descriptors.load(&self.paths.descriptors)?;
        let active = self.identity.reload_from_store()?;
        let mut text = format!(
            "Loaded {} agent descriptor(s), skipped {}",
            report.loaded,
            report.skipped.len()
        );
        match active {
            Some(descriptor) => text.push_str(&format!("\nActive agent: {}", descriptor.id)),
            None => text.push_str("\nNo agent is active"),
        }
        Ok(CommandOutput::ok(text))
    }

    fn handle_check(
        &self,
        action: &str,
        agent: Option<&str>,
        format: &str,
    ) -> Result<CommandOutput, GovernanceError> {
        let decision = match agent {
            Some(agent) => self.enforcer.check(agent, action),
            None => self.enforcer.check_active(action)?,
        };
        let text = if format == "json" {
            serde_json::to_string_pretty(&decision)?
        } else {
            format::format_decision(&decision)
        };
        let mut output = CommandOutput::ok(text).with_exit_code(decision.exit_code());
        if decision.is_warned() {
            output = output.with_notice(format!("warning: {}", decision.reason));
        }
        Ok(output)
    }

    fn handle_blocked(&self, agent: Option<&str>, format: &str) -> Result<CommandOutput, GovernanceError> {
        let agent_id = match agent {
            Some(agent) => agent.to_string(),
            None => self
                .identity
                .current()?
                .map(|d| d.id.clone())
                .ok_or_else(|| GovernanceError::ConfigError("No agent is active; pass --agent".to_string()))?,
        };
        let blocked = self.enforcer.list_blocked_actions(&agent_id);
        if format == "json" {
            return Ok(CommandOutput::ok(serde_json::to_string_pretty(
                &json!({ "agent_id": agent_id, "blocked": blocked }),
            )?));
        }
        let mut text = format!("{}\n\n", format::format_section_heading(&format!("Blocked for {}", agent_id)));
        for tag in &blocked {
            text.push_str(&format!("  {}\n", tag));
        }
        Ok(CommandOutput::ok(text))
    }

    fn handle_bleed_check(&self, text: &str, format: &str) -> Result<CommandOutput, GovernanceError> {
        let check = self.identity.verify_no_identity_bleed(text)?;
        let output = if format == "json" {
            serde_json::to_string_pretty(&json!({
                "clean": check.is_clean(),
                "active_agent": check.active_agent,
                "impersonated": check.impersonated,
                "reason": check.reason(),
            }))?
        } else {
            check.reason()
        };
        Ok(CommandOutput::ok(output).with_exit_code(if check.is_clean() { 0 } else { 2 }))
    }

    fn build_orchestrator(&self, agent: Option<String>) -> Result<ValidatorOrchestrator, GovernanceError> {
        let audit = &self.config.audit;
        let orchestrator = ValidatorOrchestrator::new(audit.orchestrator_config());
        let mut orchestrator = match agent {
            Some(agent) => orchestrator.with_authorization_for(self.enforcer.clone(), agent, &audit.required_action),
            None => orchestrator.with_authorization(self.enforcer.clone(), &audit.required_action),
        };
        for validator in &audit.validators {
            orchestrator.register(Arc::new(CommandValidator::new(validator.clone())))?;
        }
        for rule in &audit.compound_rules {
            orchestrator.add_rule(rule.clone())?;
        }
        Ok(orchestrator)
    }

    fn handle_audit(
        &self,
        scope: Option<PathBuf>,
        agent: Option<String>,
        fix: bool,
        format: &str,
    ) -> Result<CommandOutput, GovernanceError> {
        let root = match scope {
            Some(path) if path.is_absolute() => path,
            Some(path) => self.workspace_root.join(path),
            None => self.workspace_root.clone(),
        };
        let scope = AuditScope::new(dunce::canonicalize(&root)?);
        let orchestrator = self.build_orchestrator(agent)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let (report, remediation) = runtime.block_on(async {
            let report = orchestrator.run(&scope).await;
            let remediation = if fix && report.reached(AuditPhase::Dispatched) {
                Some(self.remediate(&orchestrator, &scope, &report).await)
            } else {
                None
            };
            (report, remediation)
        });

        let stored = AuditReportStore::new(&self.paths.audits).save(&report)?;
        info!(run_id = %report.run_id, path = %stored.display(), verdict = %report.verdict, "Audit report stored");

        let text = if format == "json" {
            let remediation_json = remediation.as_ref().map(|results| {
                results
                    .iter()
                    .map(|(finding, result)| json!({ "finding": finding, "result": result }))
                    .collect::<Vec<_>>()
            });
            serde_json::to_string_pretty(&json!({
                "report": report,
                "remediation": remediation_json,
            }))?
        } else {
            let mut text = format::format_audit_report(&report);
            if let Some(results) = &remediation {
                text.push('\n');
                text.push_str(&format::format_remediation(results));
            }
            text
        };
        Ok(CommandOutput::ok(text).with_exit_code(report.verdict.exit_code()))
    }

    async fn remediate(
        &self,
        orchestrator: &ValidatorOrchestrator,
        scope: &AuditScope,
        report: &AuditReport,
    ) -> Vec<(Finding, RemediationResult)> {
        let mut engine = RemediationEngine::new(scope.clone())
            .with_validators_from(orchestrator)
            .with_escalation(Arc::new(FileEscalationChannel::new(&self.paths.escalations)))
            .with_attempt_timeout(self.config.remediation.attempt_timeout());
        for strategy in &self.config.remediation.strategies {
            engine = engine.with_strategy(Arc::new(CommandStrategy::new(strategy.clone())));
        }
        engine.fix_all(report).await
    }

    fn handle_report(&self, run: Option<&str>, format: &str) -> Result<CommandOutput, GovernanceError> {
        let store = AuditReportStore::new(&self.paths.audits);
        let report = match run {
            Some(run_id) => store.load(run_id)?,
            None => store.latest()?,
        };
        let Some(report) = report else {
            return Ok(CommandOutput::ok("No audit reports stored".to_string()).with_exit_code(1));
        };
        let text = if format == "json" {
            serde_json::to_string_pretty(&report)?
        } else {
            format::format_audit_report(&report)
        };
        Ok(CommandOutput::ok(text).with_exit_code(report.verdict.exit_code()))
    }
}
