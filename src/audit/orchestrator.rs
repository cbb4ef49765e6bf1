//! Validator orchestration
//!
//! One audit run walks `DISPATCHED → COLLECTED → CROSS_VALIDATED →
//! PRIORITIZED → REPORTED → VERDICT_ISSUED`. Validators run concurrently,
//! each under its own timeout; a validator that errors, panics or times out
//! becomes a synthetic INFO finding and the run carries on.

use super::compound::{CompoundRule, FiredRule};
use super::finding::{Finding, FindingKind};
use super::report::{derive_verdict, run_id_for, AuditPhase, AuditReport, SeverityCounts, ValidatorFailure};
use super::validator::{AuditScope, Validator};
use crate::error::GovernanceError;
use crate::scope::ScopeEnforcer;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action an agent must be allowed to perform to run an audit
pub const DEFAULT_AUDIT_ACTION: &str = "run_audit";

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock bound per validator
    pub validator_timeout: Duration,
    /// HIGH findings tolerated before the verdict turns to FAIL
    pub high_threshold: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            validator_timeout: Duration::from_secs(30),
            high_threshold: 3,
        }
    }
}

/// Who the run is for and which action authorizes it
struct Authorization {
    enforcer: Arc<ScopeEnforcer>,
    /// `None` checks whichever agent is active
    agent_id: Option<String>,
    action: String,
}

/// Result of dispatching one validator
enum DispatchOutcome {
    Completed(Vec<Finding>),
    Failed(String),
}

/// Fans out to registered validators and issues a verdict
pub struct ValidatorOrchestrator {
    validators: Vec<Arc<dyn Validator>>,
    rules: Vec<CompoundRule>,
    config: OrchestratorConfig,
    authorization: Option<Authorization>,
}

impl ValidatorOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            validators: Vec::new(),
            rules: Vec::new(),
            config,
            authorization: None,
        }
    }

    /// Register a validator; ids must be unique
    pub fn register(&mut self, validator: Arc<dyn Validator>) -> Result<(), GovernanceError> {
        if self.validators.iter().any(|v| v.id() == validator.id()) {
            return Err(GovernanceError::ConfigError(format!(
                "Validator '{}' is already registered",
                validator.id()
            )));
        }
        debug!(validator = %validator.id(), "Registered validator");
        self.validators.push(validator);
        Ok(())
    }

    pub fn add_rule(&mut self, rule: CompoundRule) -> Result<(), GovernanceError> {
        rule.validate().map_err(GovernanceError::ConfigError)?;
        for id in &rule.validators {
            if !self.validators.iter().any(|v| v.id() == id) {
                warn!(rule = %rule.id, validator = %id, "Compound rule references an unregistered validator");
            }
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Require the active agent to hold `action` before any run
    pub fn with_authorization(mut self, enforcer: Arc<ScopeEnforcer>, action: impl Into<String>) -> Self {
        self.authorization = Some(Authorization {
            enforcer,
            agent_id: None,
            action: action.into(),
        });
        self
    }

    /// Require a specific agent to hold `action` before any run
    pub fn with_authorization_for(
        mut self,
        enforcer: Arc<ScopeEnforcer>,
        agent_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.authorization = Some(Authorization {
            enforcer,
            agent_id: Some(agent_id.into()),
            action: action.into(),
        });
        self
    }

    pub fn validator(&self, id: &str) -> Option<Arc<dyn Validator>> {
        self.validators.iter().find(|v| v.id() == id).cloned()
    }

    pub fn validator_ids(&self) -> Vec<String> {
        self.validators.iter().map(|v| v.id().to_string()).collect()
    }

    pub fn rules(&self) -> &[CompoundRule] {
        &self.rules
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the agent the run is for, or the refusal reason.
    fn authorize(&self) -> Result<Option<String>, (Option<String>, String)> {
        let Some(auth) = &self.authorization else {
            return Ok(None);
        };
        let decision = match &auth.agent_id {
            Some(agent_id) => auth.enforcer.check(agent_id, &auth.action),
            None => auth
                .enforcer
                .check_active(&auth.action)
                .map_err(|e| (None, format!("authorization check failed: {}", e)))?,
        };
        let agent = if decision.agent_id.is_empty() {
            None
        } else {
            Some(decision.agent_id.clone())
        };
        if decision.is_blocked() {
            return Err((agent, format!("audit not authorized: {}", decision.reason)));
        }
        Ok(agent)
    }

    /// Run one audit against `scope`. Always returns a report with a verdict.
    pub async fn run(&self, scope: &AuditScope) -> AuditReport {
        let requested_by = match self.authorize() {
            Ok(agent) => agent,
            Err((agent, reason)) => {
                warn!(reason = %reason, "Audit refused");
                return AuditReport::refused(scope.clone(), agent, reason);
            }
        };

        let started_at = Utc::now();
        let mut phases = vec![AuditPhase::Dispatched];
        info!(
            validators = self.validators.len(),
            root = %scope.root.display(),
            "Dispatching audit"
        );
        let outcomes = self.dispatch(scope).await;

        // Collect
        let mut raw: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
        let mut failed_validators = Vec::new();
        let mut collected = Vec::new();
        for (validator_id, outcome) in outcomes {
            let findings = match outcome {
                DispatchOutcome::Completed(findings) => findings
                    .into_iter()
                    .map(|mut f| {
                        // Synthetic kinds are assigned here, never by validators
                        f.validator_id = validator_id.clone();
                        f.kind = FindingKind::Reported;
                        f
                    })
                    .collect::<Vec<_>>(),
                DispatchOutcome::Failed(reason) => {
                    failed_validators.push(ValidatorFailure {
                        validator_id: validator_id.clone(),
                        reason: reason.clone(),
                    });
                    vec![Finding::validator_failed(&validator_id, &reason)]
                }
            };
            collected.extend(findings.iter().cloned());
            raw.insert(validator_id, findings);
        }
        phases.push(AuditPhase::Collected);

        // Cross-validate
        let (fired_rules, compound) = self.cross_validate(&collected);
        collected.extend(compound);
        phases.push(AuditPhase::CrossValidated);

        prioritize(&mut collected);
        phases.push(AuditPhase::Prioritized);

        let counts = SeverityCounts::from_findings(&collected);
        phases.push(AuditPhase::Reported);

        let registered = self.validators.len();
        let reachable = registered - failed_validators.len();
        let (verdict, verdict_reason) =
            derive_verdict(&counts, registered, reachable, self.config.high_threshold);
        phases.push(AuditPhase::VerdictIssued);

        let finished_at = Utc::now();
        info!(
            verdict = %verdict,
            findings = counts.total(),
            critical = counts.critical,
            high = counts.high,
            failed_validators = failed_validators.len(),
            fired_rules = fired_rules.len(),
            "Audit verdict issued"
        );

        AuditReport {
            run_id: run_id_for(started_at),
            started_at,
            finished_at,
            scope: scope.clone(),
            requested_by,
            validators: self.validator_ids(),
            raw,
            failed_validators,
            fired_rules,
            findings: collected,
            counts,
            verdict,
            verdict_reason,
            phases,
        }
    }

    /// Run every validator concurrently, each bounded by the configured timeout.
    async fn dispatch(&self, scope: &AuditScope) -> Vec<(String, DispatchOutcome)> {
        let timeout = self.config.validator_timeout;
        let handles = self.validators.iter().map(|validator| {
            let validator = Arc::clone(validator);
            let scope = scope.clone();
            let id = validator.id().to_string();
            let handle = tokio::spawn(async move {
                let start = Instant::now();
                let result = tokio::time::timeout(timeout, validator.run(&scope)).await;
                (result, start.elapsed())
            });
            async move { (id, handle.await) }
        });

        futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|(id, joined)| {
                let outcome = match joined {
                    Ok((Ok(Ok(findings)), elapsed)) => {
                        debug!(
                            validator = %id,
                            findings = findings.len(),
                            duration_ms = elapsed.as_millis() as u64,
                            "Validator completed"
                        );
                        DispatchOutcome::Completed(findings)
                    }
                    Ok((Ok(Err(e)), _)) => {
                        warn!(validator = %id, error = %e, "Validator failed");
                        DispatchOutcome::Failed(e.to_string())
                    }
                    Ok((Err(_), _)) => {
                        warn!(validator = %id, timeout_ms = timeout.as_millis() as u64, "Validator timed out");
                        DispatchOutcome::Failed(format!("timed out after {}ms", timeout.as_millis()))
                    }
                    Err(join_error) => {
                        warn!(validator = %id, error = %join_error, "Validator task aborted");
                        DispatchOutcome::Failed(format!("validator task aborted: {}", join_error))
                    }
                };
                (id, outcome)
            })
            .collect()
    }

    fn cross_validate(&self, findings: &[Finding]) -> (Vec<FiredRule>, Vec<Finding>) {
        let mut fired = Vec::new();
        let mut synthetic = Vec::new();
        for rule in &self.rules {
            if let Some((record, finding)) = rule.evaluate(findings) {
                info!(
                    rule = %record.rule_id,
                    severity = %record.severity,
                    contributing = record.contributing.len(),
                    "Compound rule fired"
                );
                fired.push(record);
                synthetic.push(finding);
            }
        }
        (fired, synthetic)
    }
}

/// Stable sort: severity descending, then validator id, then location
pub fn prioritize(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.validator_id.cmp(&b.validator_id))
            .then_with(|| a.location.cmp(&b.location))
    });
}
