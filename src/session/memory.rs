use crate::error::GovernanceError;
use crate::session::contract::SessionStore;
use crate::session::state::SessionState;
use parking_lot::Mutex;
use std::path::PathBuf;

/// In-process session store for embedding and tests
#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<Option<SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> SessionState {
        self.state.lock().clone().unwrap_or_default()
    }

    fn save(&self, state: &SessionState) -> Result<(), GovernanceError> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), GovernanceError> {
        *self.state.lock() = None;
        Ok(())
    }

    fn path(&self) -> Option<PathBuf> {
        None
    }
}
