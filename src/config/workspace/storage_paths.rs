//! Descriptor and state locations, resolved against the workspace root.

use crate::config::xdg;
use crate::error::GovernanceError;
use crate::session::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_descriptor_path() -> PathBuf {
    PathBuf::from("agents")
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Where agent descriptors live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorsConfig {
    /// Descriptor directory; relative paths are taken from the workspace root
    #[serde(default = "default_descriptor_path")]
    pub path: PathBuf,
}

impl DescriptorsConfig {
    pub fn resolve_dir(&self, workspace_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            workspace_root.join(&self.path)
        }
    }
}

impl Default for DescriptorsConfig {
    fn default() -> Self {
        Self {
            path: default_descriptor_path(),
        }
    }
}

/// Session persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// State directory; `None` uses `$XDG_STATE_HOME/warden/<workspace path>`
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl SessionConfig {
    /// Resolve the directory holding the session file, audit reports and escalations.
    pub fn resolve_state_dir(&self, workspace_root: &Path) -> Result<PathBuf, GovernanceError> {
        match &self.state_dir {
            Some(dir) if dir.is_absolute() => Ok(dir.clone()),
            Some(dir) => Ok(workspace_root.join(dir)),
            None => xdg::workspace_state_dir(workspace_root),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            history_limit: default_history_limit(),
        }
    }
}

/// Fully resolved locations for one workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub descriptors: PathBuf,
    pub state_dir: PathBuf,
    pub session_file: PathBuf,
    pub audits: PathBuf,
    pub escalations: PathBuf,
}

impl StatePaths {
    pub fn resolve(
        descriptors: &DescriptorsConfig,
        session: &SessionConfig,
        workspace_root: &Path,
    ) -> Result<Self, GovernanceError> {
        let state_dir = session.resolve_state_dir(workspace_root)?;
        Ok(Self {
            descriptors: descriptors.resolve_dir(workspace_root),
            session_file: state_dir.join(crate::session::SESSION_FILE_NAME),
            audits: state_dir.join("audits"),
            escalations: state_dir.join("escalations"),
            state_dir,
        })
    }
}
