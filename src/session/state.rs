//! Session state value object.
//!
//! Field names are part of the on-disk contract read by other tooling;
//! renaming any of them is a breaking change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of past activations kept in `agentHistory`
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// One past activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub agent: String,
    pub at: DateTime<Utc>,
}

/// Which agent is active and since when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub active_agent: Option<String>,
    /// Descriptor file used for the activation
    #[serde(default)]
    pub agent_file: Option<PathBuf>,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_task: Option<String>,
    /// Oldest first, bounded
    #[serde(default)]
    pub agent_history: Vec<HistoryEntry>,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        self.active_agent.is_some()
    }

    pub fn is_active_as(&self, agent_id: &str) -> bool {
        self.active_agent.as_deref() == Some(agent_id)
    }

    /// Mark `agent_id` active and record it in the bounded history.
    pub fn activate(
        &mut self,
        agent_id: &str,
        agent_file: Option<PathBuf>,
        now: DateTime<Utc>,
        history_limit: usize,
    ) {
        self.active_agent = Some(agent_id.to_string());
        self.agent_file = agent_file;
        self.activated_at = Some(now);
        self.last_activity = Some(now);
        self.current_task = None;
        self.agent_history.push(HistoryEntry {
            agent: agent_id.to_string(),
            at: now,
        });
        self.trim_history(history_limit);
    }

    /// Clear the active identity; history is kept.
    pub fn deactivate(&mut self) {
        self.active_agent = None;
        self.agent_file = None;
        self.activated_at = None;
        self.last_activity = None;
        self.current_task = None;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    pub fn trim_history(&mut self, limit: usize) {
        if self.agent_history.len() > limit {
            let excess = self.agent_history.len() - limit;
            self.agent_history.drain(..excess);
        }
    }
}
