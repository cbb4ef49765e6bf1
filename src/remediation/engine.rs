//! Remediation engine: bounded fix loop with escalation.
//!
//! Each finding gets at most [`MAX_ATTEMPTS`] strategy applications. Every
//! attempt is confirmed by re-running the validator that reported the finding.
//! A finding that survives every attempt is escalated and the escalation is
//! final: later calls return the recorded result without trying again.

use super::attempt::{FixAttempt, FixOutcome, RemediationResult, RemediationState, MAX_ATTEMPTS};
use super::escalation::{EscalationChannel, EscalationRecord, LogEscalationChannel};
use super::strategy::{FirstUntriedSelector, FixStrategy, StrategySelector};
use crate::audit::{AuditReport, AuditScope, Finding, Severity, Validator, ValidatorOrchestrator};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on one strategy application plus its re-validation
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct RemediationEngine {
    scope: AuditScope,
    strategies: Vec<Arc<dyn FixStrategy>>,
    selector: Box<dyn StrategySelector>,
    validators: HashMap<String, Arc<dyn Validator>>,
    escalation: Arc<dyn EscalationChannel>,
    attempt_timeout: Duration,
    /// Terminal results by finding fingerprint
    ledger: Mutex<HashMap<String, RemediationResult>>,
}

impl RemediationEngine {
    pub fn new(scope: AuditScope) -> Self {
        Self {
            scope,
            strategies: Vec::new(),
            selector: Box::new(FirstUntriedSelector),
            validators: HashMap::new(),
            escalation: Arc::new(LogEscalationChannel),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn FixStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_selector(mut self, selector: Box<dyn StrategySelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Register the validator used to confirm fixes for its findings
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.insert(validator.id().to_string(), validator);
        self
    }

    /// Confirm fixes with every validator the orchestrator runs
    pub fn with_validators_from(mut self, orchestrator: &ValidatorOrchestrator) -> Self {
        for id in orchestrator.validator_ids() {
            if let Some(validator) = orchestrator.validator(&id) {
                self.validators.insert(id, validator);
            }
        }
        self
    }

    pub fn with_escalation(mut self, channel: Arc<dyn EscalationChannel>) -> Self {
        self.escalation = channel;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn strategies(&self) -> &[Arc<dyn FixStrategy>] {
        &self.strategies
    }

    /// Where a finding stands; `Pending` until `fix` has settled it
    pub fn state_of(&self, finding: &Finding) -> RemediationState {
        self.ledger
            .lock()
            .get(&finding.fingerprint())
            .map(|r| r.state)
            .unwrap_or(RemediationState::Pending)
    }

    /// Drive one finding to FIXED or ESCALATED.
    pub async fn fix(&self, finding: &Finding) -> RemediationResult {
        let fingerprint = finding.fingerprint();

        if let Some(settled) = self.settled_escalation(&fingerprint) {
            debug!(fingerprint = %fingerprint, "Finding already escalated; not retrying");
            return settled;
        }

        if finding.is_synthetic() {
            return self.escalate(
                finding,
                fingerprint,
                Vec::new(),
                "synthetic finding has no validator to confirm a fix against",
            );
        }
        let Some(validator) = self.validators.get(&finding.validator_id).cloned() else {
            return self.escalate(
                finding,
                fingerprint,
                Vec::new(),
                format!("no validator '{}' available to confirm a fix", finding.validator_id),
            );
        };

        let applicable: Vec<Arc<dyn FixStrategy>> = self
            .strategies
            .iter()
            .filter(|s| s.applies_to(finding))
            .cloned()
            .collect();

        let mut attempts: Vec<FixAttempt> = Vec::new();
        while attempts.len() < MAX_ATTEMPTS {
            let Some(strategy) = self.selector.select(finding, &applicable, &attempts) else {
                break;
            };
            if attempts.iter().any(|a| a.strategy == strategy.name()) {
                warn!(strategy = %strategy.name(), "Selector repeated a strategy; stopping");
                break;
            }

            let iteration = attempts.len() + 1;
            let attempt = self.attempt(iteration, strategy.as_ref(), validator.as_ref(), finding, &fingerprint).await;
            info!(
                fingerprint = %fingerprint,
                iteration,
                strategy = %attempt.strategy,
                outcome = %attempt.outcome,
                error = attempt.error.as_deref().unwrap_or(""),
                "Fix attempt recorded"
            );
            let fixed = attempt.outcome == FixOutcome::Fixed;
            attempts.push(attempt);

            if fixed {
                let result = RemediationResult::fixed(fingerprint.clone(), attempts);
                self.ledger.lock().insert(fingerprint, result.clone());
                return result;
            }
        }

        let reason = if attempts.len() >= MAX_ATTEMPTS {
            format!("finding persisted after {} attempts", MAX_ATTEMPTS)
        } else if attempts.is_empty() {
            "no applicable fix strategy".to_string()
        } else {
            format!("no untried strategy left after {} attempt(s)", attempts.len())
        };
        self.escalate(finding, fingerprint, attempts, reason)
    }

    /// Remediate every non-INFO finding of a report, in priority order.
    ///
    /// Findings are handled one at a time since strategies mutate the workspace.
    pub async fn fix_all(&self, report: &AuditReport) -> Vec<(Finding, RemediationResult)> {
        let mut results = Vec::new();
        for finding in report.findings.iter().filter(|f| f.severity > Severity::Info) {
            let result = self.fix(finding).await;
            results.push((finding.clone(), result));
        }
        let fixed = results.iter().filter(|(_, r)| r.is_fixed()).count();
        info!(
            run_id = %report.run_id,
            fixed,
            escalated = results.len() - fixed,
            "Remediation pass complete"
        );
        results
    }

    async fn attempt(
        &self,
        iteration: usize,
        strategy: &dyn FixStrategy,
        validator: &dyn Validator,
        finding: &Finding,
        fingerprint: &str,
    ) -> FixAttempt {
        let timeout_ms = self.attempt_timeout.as_millis();
        match tokio::time::timeout(self.attempt_timeout, strategy.apply(finding, &self.scope)).await {
            Err(_) => {
                return FixAttempt::new(iteration, strategy.name(), FixOutcome::Failed)
                    .with_error(format!("strategy timed out after {}ms", timeout_ms));
            }
            Ok(Err(e)) => {
                return FixAttempt::new(iteration, strategy.name(), FixOutcome::Failed).with_error(e.to_string());
            }
            Ok(Ok(())) => {}
        }

        match tokio::time::timeout(self.attempt_timeout, validator.run(&self.scope)).await {
            Err(_) => FixAttempt::new(iteration, strategy.name(), FixOutcome::Failed)
                .with_error(format!("re-validation timed out after {}ms", timeout_ms)),
            Ok(Err(e)) => FixAttempt::new(iteration, strategy.name(), FixOutcome::Failed)
                .with_error(format!("re-validation failed: {}", e)),
            Ok(Ok(findings)) => {
                let still_present = findings.into_iter().any(|mut f| {
                    f.validator_id = finding.validator_id.clone();
                    f.fingerprint() == fingerprint
                });
                if still_present {
                    FixAttempt::new(iteration, strategy.name(), FixOutcome::Partial)
                        .with_error("finding still reported after the fix")
                } else {
                    FixAttempt::new(iteration, strategy.name(), FixOutcome::Fixed)
                }
            }
        }
    }

    fn settled_escalation(&self, fingerprint: &str) -> Option<RemediationResult> {
        if let Some(result) = self.ledger.lock().get(fingerprint) {
            if result.is_escalated() {
                return Some(result.clone());
            }
        }
        match self.escalation.find(fingerprint) {
            Ok(Some(record)) => {
                let result = RemediationResult::escalated(record.fingerprint, record.attempts, record.reason);
                self.ledger.lock().insert(fingerprint.to_string(), result.clone());
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(fingerprint, error = %e, "Could not read escalation history");
                None
            }
        }
    }

    fn escalate(
        &self,
        finding: &Finding,
        fingerprint: String,
        attempts: Vec<FixAttempt>,
        reason: impl Into<String>,
    ) -> RemediationResult {
        let reason = reason.into();
        let record = EscalationRecord {
            fingerprint: fingerprint.clone(),
            finding: finding.clone(),
            attempts: attempts.clone(),
            reason: reason.clone(),
            escalated_at: Utc::now(),
        };
        if let Err(e) = self.escalation.escalate(&record) {
            warn!(fingerprint = %fingerprint, error = %e, "Escalation channel failed; escalation kept in memory");
        }
        info!(
            fingerprint = %fingerprint,
            attempts = attempts.len(),
            reason = %reason,
            "Finding escalated"
        );
        let result = RemediationResult::escalated(fingerprint.clone(), attempts, reason);
        self.ledger.lock().insert(fingerprint, result.clone());
        result
    }
}
