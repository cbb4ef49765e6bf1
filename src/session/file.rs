use crate::error::GovernanceError;
use crate::session::contract::SessionStore;
use crate::session::state::SessionState;
use crate::store::{read_json, write_json_atomic};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the session snapshot inside the state directory
pub const SESSION_FILE_NAME: &str = "session-state.json";

/// Session store backed by `<state_dir>/session-state.json`
pub struct FileSessionStore {
    path: PathBuf,
    /// Serializes writers inside this process
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the default file name inside `state_dir`
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(SESSION_FILE_NAME))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> SessionState {
        match read_json::<SessionState>(&self.path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!(path = %self.path.display(), "No session file, starting empty");
                SessionState::default()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Unreadable session file, starting empty"
                );
                SessionState::default()
            }
        }
    }

    fn save(&self, state: &SessionState) -> Result<(), GovernanceError> {
        let _guard = self.write_lock.lock();
        write_json_atomic(&self.path, state)?;
        debug!(
            path = %self.path.display(),
            active_agent = ?state.active_agent,
            "Saved session state"
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), GovernanceError> {
        let _guard = self.write_lock.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GovernanceError::SessionPersistence(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}
