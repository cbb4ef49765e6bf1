//! XDG Base Directory utilities for per-workspace state.

use crate::error::GovernanceError;
use std::path::{Component, Path, PathBuf};

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, GovernanceError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Ok(PathBuf::from(xdg_config_home));
        }
    }
    home_dir("config").map(|home| home.join(".config"))
}

/// Get XDG state home directory
///
/// Returns `$XDG_STATE_HOME` if set, otherwise defaults to `$HOME/.local/state`
pub fn state_home() -> Result<PathBuf, GovernanceError> {
    if let Ok(xdg_state_home) = std::env::var("XDG_STATE_HOME") {
        if !xdg_state_home.is_empty() {
            return Ok(PathBuf::from(xdg_state_home));
        }
    }
    home_dir("state").map(|home| home.join(".local").join("state"))
}

fn home_dir(kind: &str) -> Result<PathBuf, GovernanceError> {
    std::env::var("HOME").map(PathBuf::from).map_err(|_| {
        GovernanceError::ConfigError(format!(
            "Could not determine XDG {} home directory (HOME not set)",
            kind
        ))
    })
}

/// Global config file: `$XDG_CONFIG_HOME/warden/config.toml`
pub fn global_config_path() -> Result<PathBuf, GovernanceError> {
    Ok(config_home()?.join("warden").join("config.toml"))
}

/// Get the state directory for a specific workspace
///
/// Returns `$XDG_STATE_HOME/warden/<workspace_path>/`. The canonical
/// workspace path is mirrored as a directory structure, so
/// `/home/user/projects/app` maps to
/// `$XDG_STATE_HOME/warden/home/user/projects/app/`.
pub fn workspace_state_dir(workspace_root: &Path) -> Result<PathBuf, GovernanceError> {
    join_workspace_segments(&state_home()?.join("warden"), workspace_root)
}

/// Append the canonical workspace path components to `base`.
pub fn join_workspace_segments(base: &Path, workspace_root: &Path) -> Result<PathBuf, GovernanceError> {
    let canonical = dunce::canonicalize(workspace_root).map_err(|e| {
        GovernanceError::ConfigError(format!(
            "Failed to canonicalize workspace path {}: {}",
            workspace_root.display(),
            e
        ))
    })?;

    let mut dir = base.to_path_buf();
    for component in canonical.components() {
        if let Component::Normal(name) = component {
            dir.push(name);
        }
    }
    Ok(dir)
}
