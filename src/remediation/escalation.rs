//! Escalation channels: where findings go once automation gives up.

use super::attempt::FixAttempt;
use crate::audit::Finding;
use crate::error::GovernanceError;
use crate::store::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Everything a human reviewer needs: the finding and every attempt made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub fingerprint: String,
    pub finding: Finding,
    pub attempts: Vec<FixAttempt>,
    pub reason: String,
    pub escalated_at: DateTime<Utc>,
}

pub trait EscalationChannel: Send + Sync {
    fn escalate(&self, record: &EscalationRecord) -> Result<(), GovernanceError>;

    /// A previously escalated record for `fingerprint`, if the channel keeps them
    fn find(&self, _fingerprint: &str) -> Result<Option<EscalationRecord>, GovernanceError> {
        Ok(None)
    }
}

/// Writes one JSON file per finding under `<dir>/<fingerprint>.json`
pub struct FileEscalationChannel {
    dir: PathBuf,
}

impl FileEscalationChannel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }

    /// All stored escalations, oldest first
    pub fn list(&self) -> Result<Vec<EscalationRecord>, GovernanceError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = read_json::<EscalationRecord>(&path)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.escalated_at.cmp(&b.escalated_at));
        Ok(records)
    }
}

impl EscalationChannel for FileEscalationChannel {
    fn escalate(&self, record: &EscalationRecord) -> Result<(), GovernanceError> {
        write_json_atomic(&self.path_for(&record.fingerprint), record)
    }

    fn find(&self, fingerprint: &str) -> Result<Option<EscalationRecord>, GovernanceError> {
        read_json(&self.path_for(fingerprint))
    }
}

/// Reports escalations through the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEscalationChannel;

impl EscalationChannel for LogEscalationChannel {
    fn escalate(&self, record: &EscalationRecord) -> Result<(), GovernanceError> {
        let history = record
            .attempts
            .iter()
            .map(|a| match &a.error {
                Some(error) => format!("#{} {} {} ({})", a.iteration, a.strategy, a.outcome, error),
                None => format!("#{} {} {}", a.iteration, a.strategy, a.outcome),
            })
            .collect::<Vec<_>>()
            .join("; ");
        warn!(
            fingerprint = %record.fingerprint,
            validator = %record.finding.validator_id,
            severity = %record.finding.severity,
            location = %record.finding.location,
            attempts = record.attempts.len(),
            history = %history,
            reason = %record.reason,
            "Finding escalated for human review"
        );
        Ok(())
    }
}
