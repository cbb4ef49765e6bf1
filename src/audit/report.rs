//! Audit reports, verdicts, and report persistence.

use super::compound::FiredRule;
use super::finding::{Finding, Severity};
use super::validator::AuditScope;
use crate::error::GovernanceError;
use crate::store::{read_json, write_json_new};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stages of one audit run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditPhase {
    Dispatched,
    Collected,
    CrossValidated,
    Prioritized,
    Reported,
    VerdictIssued,
}

/// Final verdict of an audit run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Concerns,
    Fail,
    /// The audit could not run: unauthorized, or no validator reachable
    Blocked,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Concerns => "CONCERNS",
            Verdict::Fail => "FAIL",
            Verdict::Blocked => "BLOCKED",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Pass | Verdict::Concerns => 0,
            Verdict::Fail | Verdict::Blocked => 1,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Derive the verdict from the prioritized findings.
///
/// `reachable` is the number of validators that returned a result.
pub fn derive_verdict(
    counts: &SeverityCounts,
    registered: usize,
    reachable: usize,
    high_threshold: usize,
) -> (Verdict, String) {
    if registered == 0 {
        return (Verdict::Blocked, "no validators are registered".to_string());
    }
    if reachable == 0 {
        return (
            Verdict::Blocked,
            format!("none of the {} validators could be reached", registered),
        );
    }
    if counts.critical > 0 {
        return (
            Verdict::Fail,
            format!("{} critical finding(s)", counts.critical),
        );
    }
    if counts.high > high_threshold {
        return (
            Verdict::Fail,
            format!(
                "{} high finding(s) exceed the threshold of {}",
                counts.high, high_threshold
            ),
        );
    }
    if counts.high > 0 {
        return (
            Verdict::Concerns,
            format!(
                "{} high finding(s) within the threshold of {}",
                counts.high, high_threshold
            ),
        );
    }
    (Verdict::Pass, "no high or critical findings".to_string())
}

/// A validator that errored or timed out during dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorFailure {
    pub validator_id: String,
    pub reason: String,
}

/// Consolidated report of one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Run key derived from the start timestamp
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scope: AuditScope,
    /// Agent the run was authorized for, if authorization was checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    /// Registered validator ids in dispatch order
    pub validators: Vec<String>,
    /// Raw findings per validator, including synthetic failure entries
    pub raw: BTreeMap<String, Vec<Finding>>,
    pub failed_validators: Vec<ValidatorFailure>,
    pub fired_rules: Vec<FiredRule>,
    /// All findings, compound ones included, highest severity first
    pub findings: Vec<Finding>,
    pub counts: SeverityCounts,
    pub verdict: Verdict,
    pub verdict_reason: String,
    pub phases: Vec<AuditPhase>,
}

impl AuditReport {
    /// Report for a run refused before dispatch
    pub fn refused(scope: AuditScope, requested_by: Option<String>, reason: String) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id_for(now),
            started_at: now,
            finished_at: now,
            scope,
            requested_by,
            validators: Vec::new(),
            raw: BTreeMap::new(),
            failed_validators: Vec::new(),
            fired_rules: Vec::new(),
            findings: Vec::new(),
            counts: SeverityCounts::default(),
            verdict: Verdict::Blocked,
            verdict_reason: reason,
            phases: vec![AuditPhase::VerdictIssued],
        }
    }

    pub fn reached(&self, phase: AuditPhase) -> bool {
        self.phases.contains(&phase)
    }

    /// Findings worth remediating: everything except synthetic entries and INFO
    pub fn actionable(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| !f.is_synthetic() && f.severity > Severity::Info)
    }
}

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Run key: sortable UTC timestamp safe for file names.
///
/// A short suffix keyed on process and call count keeps runs started in the
/// same millisecond apart.
pub fn run_id_for(at: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(&at.timestamp_subsec_nanos().to_le_bytes());
    format!(
        "{}-{}",
        at.format("%Y%m%dT%H%M%S%.3fZ"),
        hex::encode(&hasher.finalize().as_bytes()[..3])
    )
}

/// Run ids name files directly under the store, so only plain stems are accepted
fn is_valid_run_id(run_id: &str) -> bool {
    !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// Stores audit reports as `<dir>/<run_id>.json`
pub struct AuditReportStore {
    dir: PathBuf,
}

impl AuditReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store a new report. An existing report with the same run id is never replaced.
    pub fn save(&self, report: &AuditReport) -> Result<PathBuf, GovernanceError> {
        let path = self.report_path(&report.run_id)?;
        write_json_new(&path, report)?;
        Ok(path)
    }

    pub fn load(&self, run_id: &str) -> Result<Option<AuditReport>, GovernanceError> {
        read_json(&self.report_path(run_id)?)
    }

    fn report_path(&self, run_id: &str) -> Result<PathBuf, GovernanceError> {
        if !is_valid_run_id(run_id) {
            return Err(GovernanceError::ConfigError(format!("Invalid audit run id '{}'", run_id)));
        }
        Ok(self.dir.join(format!("{}.json", run_id)))
    }

    /// Stored run ids, oldest first
    pub fn list(&self) -> Result<Vec<String>, GovernanceError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn latest(&self) -> Result<Option<AuditReport>, GovernanceError> {
        match self.list()?.last() {
            Some(id) => self.load(id),
            None => Ok(None),
        }
    }
}
