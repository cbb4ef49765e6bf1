//! Identity guard: owns the single-active-agent invariant.

use super::bleed::{detect_impersonation, BleedCheck};
use crate::descriptor::{AgentDescriptor, DescriptorStore};
use crate::error::GovernanceError;
use crate::session::{SessionState, SessionStore, DEFAULT_HISTORY_LIMIT};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Gate every activation goes through.
///
/// Each operation starts from the persisted session rather than the cached
/// identity, so an agent left active by an earlier process is still seen.
pub struct IdentityGuard {
    descriptors: Arc<DescriptorStore>,
    store: Arc<dyn SessionStore>,
    history_limit: usize,
    /// Last resolved identity, informational only
    cached: RwLock<Option<Arc<AgentDescriptor>>>,
    /// Serializes read-modify-write cycles within this process
    mutation: Mutex<()>,
}

impl IdentityGuard {
    pub fn new(descriptors: Arc<DescriptorStore>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            descriptors,
            store,
            history_limit: DEFAULT_HISTORY_LIMIT,
            cached: RwLock::new(None),
            mutation: Mutex::new(()),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn descriptors(&self) -> &Arc<DescriptorStore> {
        &self.descriptors
    }

    /// Persisted session as it is right now
    pub fn session(&self) -> SessionState {
        self.store.load()
    }

    /// Activate `agent_id`.
    ///
    /// Fails with `IdentityConflict` when another agent is active. Activating
    /// the already-active agent only refreshes `lastActivity`.
    pub fn activate(&self, agent_id: &str) -> Result<SessionState, GovernanceError> {
        let _guard = self.mutation.lock();
        let agent_id = agent_id.trim();
        let descriptor = self.descriptors.get(agent_id)?;
        let mut state = self.store.load();
        let now = Utc::now();

        if let Some(active) = state.active_agent.clone() {
            if active == agent_id {
                state.touch(now);
                self.store.save(&state)?;
                *self.cached.write() = Some(descriptor);
                debug!(agent_id, "Agent already active");
                return Ok(state);
            }
            if self.descriptors.exists(&active) {
                warn!(
                    active = %active,
                    requested = %agent_id,
                    "Rejected activation while another agent is active"
                );
                return Err(GovernanceError::IdentityConflict {
                    active,
                    requested: agent_id.to_string(),
                });
            }
            warn!(
                stale_agent = %active,
                "Dropping session of an agent whose descriptor no longer exists"
            );
        }

        let agent_file = if descriptor.source.as_os_str().is_empty() {
            None
        } else {
            Some(descriptor.source.clone())
        };
        state.activate(agent_id, agent_file, now, self.history_limit);
        self.store.save(&state)?;
        *self.cached.write() = Some(descriptor);
        info!(agent_id, "Activated agent");
        Ok(state)
    }

    /// Clear the active identity. No-op when nothing is active.
    pub fn deactivate(&self) -> Result<SessionState, GovernanceError> {
        let _guard = self.mutation.lock();
        let mut state = self.store.load();
        *self.cached.write() = None;
        let Some(previous) = state.active_agent.clone() else {
            debug!("Deactivate with no active agent");
            return Ok(state);
        };
        state.deactivate();
        self.store.save(&state)?;
        info!(agent_id = %previous, "Deactivated agent");
        Ok(state)
    }

    /// Record activity, optionally updating the current task label.
    pub fn touch(&self, task: Option<&str>) -> Result<SessionState, GovernanceError> {
        let _guard = self.mutation.lock();
        let mut state = self.store.load();
        if !state.is_active() {
            return Ok(state);
        }
        state.touch(Utc::now());
        if let Some(task) = task {
            let task = task.trim();
            state.current_task = if task.is_empty() {
                None
            } else {
                Some(task.to_string())
            };
        }
        self.store.save(&state)?;
        Ok(state)
    }

    /// Re-hydrate the identity from the persisted session.
    ///
    /// A session pointing at a descriptor that no longer exists is treated as
    /// inactive and the stale reference is removed from the store.
    pub fn reload_from_store(&self) -> Result<Option<Arc<AgentDescriptor>>, GovernanceError> {
        let _guard = self.mutation.lock();
        let mut state = self.store.load();
        let resolved = match state.active_agent.clone() {
            None => None,
            Some(active) => match self.descriptors.find(&active) {
                Some(descriptor) => Some(descriptor),
                None => {
                    warn!(
                        stale_agent = %active,
                        "Active agent has no descriptor, session becomes inactive"
                    );
                    state.deactivate();
                    self.store.save(&state)?;
                    None
                }
            },
        };
        *self.cached.write() = resolved.clone();
        Ok(resolved)
    }

    /// Current identity, always read from the store
    pub fn current(&self) -> Result<Option<Arc<AgentDescriptor>>, GovernanceError> {
        self.reload_from_store()
    }

    /// Identity resolved by the last operation, without touching the store
    pub fn cached(&self) -> Option<Arc<AgentDescriptor>> {
        self.cached.read().clone()
    }

    /// Check free text for claims to act as another declared identity.
    pub fn verify_no_identity_bleed(&self, text: &str) -> Result<BleedCheck, GovernanceError> {
        let active = self.current()?.map(|d| d.id.clone());
        let identities: Vec<(String, String)> = self
            .descriptors
            .all()
            .iter()
            .map(|d| (d.id.clone(), d.name.clone()))
            .collect();
        let check = detect_impersonation(text, &identities, active.as_deref());
        if !check.is_clean() {
            warn!(
                active_agent = ?check.active_agent,
                impersonated = ?check.impersonated,
                "Identity bleed detected"
            );
        }
        Ok(check)
    }
}
