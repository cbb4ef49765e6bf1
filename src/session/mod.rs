//! Session Persistence
//!
//! Durable record of which agent is active and since when. The state is a
//! cache of convenience: security decisions re-read it on every check and
//! never trust an in-memory copy across activation boundaries.

pub mod contract;
pub mod file;
pub mod memory;
pub mod state;

pub use contract::SessionStore;
pub use file::{FileSessionStore, SESSION_FILE_NAME};
pub use memory::MemorySessionStore;
pub use state::{HistoryEntry, SessionState, DEFAULT_HISTORY_LIMIT};
