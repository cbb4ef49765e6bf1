//! Snapshot Persistence
//!
//! Whole-file JSON snapshots written with write-then-rename so readers only
//! ever observe a complete previous or complete next version. Concurrent
//! writers may lose a race; the loser's snapshot is superseded, never mixed in.

use crate::error::GovernanceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), GovernanceError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Atomically replace `path` with `bytes`.
///
/// The temp file lives in the destination directory so the final rename never
/// crosses filesystems.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GovernanceError> {
    let temp = staged(path, bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        GovernanceError::SessionPersistence(format!(
            "Failed to replace {}: {}",
            path.display(),
            e.error
        ))
    })?;
    Ok(())
}

/// Temp file next to `path` holding `bytes`
fn staged(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, GovernanceError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| {
        GovernanceError::SessionPersistence(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
        GovernanceError::SessionPersistence(format!(
            "Failed to create temp file in {}: {}",
            dir.display(),
            e
        ))
    })?;
    temp.write_all(bytes)?;
    Ok(temp)
}

/// Write `value` to `path` as pretty JSON, failing if `path` already exists.
pub fn write_json_new<T: Serialize>(path: &Path, value: &T) -> Result<(), GovernanceError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let temp = staged(path, &bytes)?;
    temp.as_file().sync_all()?;
    temp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a JSON snapshot. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, GovernanceError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&content)?))
}
