//! Compound rules: escalate when independent validators agree.

use super::finding::{Finding, FindingKind, Location, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn default_min_severity() -> Severity {
    Severity::Low
}

/// When a compound rule counts a finding as qualifying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// Findings below this severity do not count
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    /// All validators must report on the same resource
    #[serde(default)]
    pub same_location: bool,
}

impl Default for TriggerCondition {
    fn default() -> Self {
        Self {
            min_severity: default_min_severity(),
            same_location: false,
        }
    }
}

/// Static escalation rule over two or more validators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundRule {
    pub id: String,
    pub validators: BTreeSet<String>,
    #[serde(default)]
    pub condition: TriggerCondition,
    pub severity: Severity,
    pub rationale: String,
}

/// A rule that fired during cross-validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredRule {
    pub rule_id: String,
    pub validators: BTreeSet<String>,
    pub severity: Severity,
    pub rationale: String,
    /// Fingerprints of the findings that triggered the rule
    pub contributing: Vec<String>,
}

impl CompoundRule {
    pub fn new(id: impl Into<String>, validators: &[&str], severity: Severity, rationale: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            validators: validators.iter().map(|v| v.to_string()).collect(),
            condition: TriggerCondition::default(),
            severity,
            rationale: rationale.into(),
        }
    }

    pub fn with_condition(mut self, condition: TriggerCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("compound rule id cannot be empty".to_string());
        }
        if self.validators.len() < 2 {
            return Err(format!(
                "compound rule '{}' needs at least two validators, has {}",
                self.id,
                self.validators.len()
            ));
        }
        Ok(())
    }

    fn qualifies(&self, finding: &Finding, validator: &str) -> bool {
        finding.kind == FindingKind::Reported
            && finding.validator_id == validator
            && finding.severity >= self.condition.min_severity
    }

    /// Evaluate the rule; on firing, return the record and the synthetic finding.
    ///
    /// The synthetic severity is the higher of the rule target and the worst
    /// contributing finding, so a rule can only ever raise severity.
    pub fn evaluate(&self, findings: &[Finding]) -> Option<(FiredRule, Finding)> {
        if self.validate().is_err() {
            return None;
        }

        let contributing: Vec<&Finding> = if self.condition.same_location {
            let shared = self.shared_resource(findings)?;
            findings
                .iter()
                .filter(|f| f.location.resource == shared)
                .filter(|f| self.validators.iter().any(|v| self.qualifies(f, v)))
                .collect()
        } else {
            let per_validator_hit = self
                .validators
                .iter()
                .all(|v| findings.iter().any(|f| self.qualifies(f, v)));
            if !per_validator_hit {
                return None;
            }
            findings
                .iter()
                .filter(|f| self.validators.iter().any(|v| self.qualifies(f, v)))
                .collect()
        };

        let worst = contributing.iter().map(|f| f.severity).max()?;
        let severity = self.severity.max(worst);

        let resources: BTreeSet<&str> = contributing
            .iter()
            .map(|f| f.location.resource.as_str())
            .collect();
        let location = if resources.len() == 1 {
            Location::new(resources.iter().next().copied().unwrap_or_default())
        } else {
            Location::new(format!("compound:{}", self.id))
        };

        let evidence = contributing
            .iter()
            .map(|f| format!("[{}] {} @ {}: {}", f.validator_id, f.severity, f.location, f.description))
            .collect::<Vec<_>>()
            .join("\n");

        let fired = FiredRule {
            rule_id: self.id.clone(),
            validators: self.validators.clone(),
            severity,
            rationale: self.rationale.clone(),
            contributing: contributing.iter().map(|f| f.fingerprint()).collect(),
        };
        let finding = Finding {
            validator_id: format!("compound:{}", self.id),
            severity,
            location,
            description: format!("compound risk '{}': {}", self.id, self.rationale),
            evidence: Some(evidence),
            kind: FindingKind::Compound,
        };
        Some((fired, finding))
    }

    /// First resource (in sorted order) every validator reported on
    fn shared_resource(&self, findings: &[Finding]) -> Option<String> {
        let mut shared: Option<BTreeSet<&str>> = None;
        for validator in &self.validators {
            let resources: BTreeSet<&str> = findings
                .iter()
                .filter(|f| self.qualifies(f, validator))
                .map(|f| f.location.resource.as_str())
                .collect();
            shared = Some(match shared {
                None => resources,
                Some(acc) => acc.intersection(&resources).copied().collect(),
            });
        }
        shared.and_then(|s| s.into_iter().next().map(str::to_string))
    }
}
