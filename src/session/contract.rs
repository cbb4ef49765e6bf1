use crate::error::GovernanceError;
use crate::session::state::SessionState;
use std::path::PathBuf;

/// Persistence port for the session state.
///
/// `load` never fails: a missing or unreadable state is an empty session.
/// `save` replaces the whole snapshot atomically.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> SessionState;
    fn save(&self, state: &SessionState) -> Result<(), GovernanceError>;
    fn clear(&self) -> Result<(), GovernanceError>;
    /// Backing file, if the store has one
    fn path(&self) -> Option<PathBuf>;
}
