//! Findings reported by validators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Finding severity, ordered `Info < Low < Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
    #[serde(alias = "critical")]
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Where a finding points: a file (optionally a line) or any resource locator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Location {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            line: None,
        }
    }

    pub fn at_line(resource: impl Into<String>, line: u32) -> Self {
        Self {
            resource: resource.into(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.resource, line),
            None => f.write_str(&self.resource),
        }
    }
}

/// How a finding came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Reported by a validator
    #[default]
    Reported,
    /// Synthetic: the validator errored or timed out
    ValidatorFailure,
    /// Synthetic: a compound rule fired
    Compound,
}

/// One validator result. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Source validator; set by the orchestrator when collecting
    #[serde(default)]
    pub validator_id: String,
    pub severity: Severity,
    pub location: Location,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default)]
    pub kind: FindingKind,
}

impl Finding {
    pub fn new(
        validator_id: impl Into<String>,
        severity: Severity,
        location: Location,
        description: impl Into<String>,
    ) -> Self {
        Self {
            validator_id: validator_id.into(),
            severity,
            location,
            description: description.into(),
            evidence: None,
            kind: FindingKind::Reported,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Synthetic INFO finding standing in for a validator that failed
    pub fn validator_failed(validator_id: &str, reason: &str) -> Self {
        Self {
            validator_id: validator_id.to_string(),
            severity: Severity::Info,
            location: Location::new(format!("validator:{}", validator_id)),
            description: format!("validator failed: {}", reason),
            evidence: None,
            kind: FindingKind::ValidatorFailure,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.kind != FindingKind::Reported
    }

    /// Stable identity of a finding across runs.
    ///
    /// Severity and evidence are left out so a re-validation that reports the
    /// same problem with a different snippet still matches.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.validator_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.location.resource.as_bytes());
        hasher.update(&[0]);
        hasher.update(&self.location.line.unwrap_or(0).to_le_bytes());
        hasher.update(&[0]);
        hasher.update(self.description.as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}
