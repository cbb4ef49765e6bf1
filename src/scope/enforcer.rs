//! Scope enforcer: runtime permission decisions.

use super::decision::{DecisionRule, Outcome, PermissionDecision};
use crate::descriptor::DescriptorStore;
use crate::error::GovernanceError;
use crate::identity::IdentityGuard;
use crate::types::{normalize_tag, ActionTag};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Actions no agent may perform, whatever its descriptor says
pub const DEFAULT_GLOBALLY_BLOCKED: &[&str] = &[
    "force_push_main",
    "delete_repository",
    "disable_security_checks",
    "commit_secrets",
    "rewrite_published_history",
];

/// Decides whether an agent may perform an action.
///
/// Rules are applied in a fixed order: global block, exclusivity, deny-list,
/// allow-list. Global blocks and exclusivity always win over what an agent's
/// own descriptor grants.
pub struct ScopeEnforcer {
    descriptors: Arc<DescriptorStore>,
    identity: Option<Arc<IdentityGuard>>,
    globally_blocked: BTreeSet<ActionTag>,
}

impl ScopeEnforcer {
    /// Enforcer with the default global block set
    pub fn new(descriptors: Arc<DescriptorStore>) -> Self {
        Self::with_global_blocks(descriptors, DEFAULT_GLOBALLY_BLOCKED.iter().copied())
    }

    pub fn with_global_blocks<I, S>(descriptors: Arc<DescriptorStore>, blocked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let globally_blocked = blocked
            .into_iter()
            .map(|t| normalize_tag(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            descriptors,
            identity: None,
            globally_blocked,
        }
    }

    /// Attach the identity guard used by [`ScopeEnforcer::check_active`]
    pub fn with_identity(mut self, identity: Arc<IdentityGuard>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn globally_blocked(&self) -> impl Iterator<Item = &ActionTag> {
        self.globally_blocked.iter()
    }

    /// Decide whether `agent_id` may perform `action`.
    pub fn check(&self, agent_id: &str, action: &str) -> PermissionDecision {
        let agent_id = agent_id.trim();
        let tag = normalize_tag(action);
        let decision = self.decide(agent_id, tag);
        log_decision(&decision);
        decision
    }

    fn decide(&self, agent_id: &str, tag: ActionTag) -> PermissionDecision {
        let decision = |outcome, rule, reason: String, authorized: Option<String>| {
            PermissionDecision {
                agent_id: agent_id.to_string(),
                action: tag.clone(),
                outcome,
                rule,
                reason,
                authorized,
            }
        };

        if self.globally_blocked.contains(&tag) {
            return decision(
                Outcome::Blocked,
                DecisionRule::GlobalBlock,
                format!("'{}' is globally blocked for every agent", tag),
                None,
            );
        }

        if let Some(owner) = self.descriptors.exclusive_owner(&tag) {
            if owner != agent_id {
                return decision(
                    Outcome::Blocked,
                    DecisionRule::Exclusivity,
                    format!("'{}' is exclusive to '{}'", tag, owner),
                    Some(owner),
                );
            }
        }

        let Some(descriptor) = self.descriptors.find(agent_id) else {
            return decision(
                Outcome::Blocked,
                DecisionRule::UnknownAgent,
                format!("no descriptor is loaded for agent '{}'", agent_id),
                None,
            );
        };

        if descriptor.denies(&tag) {
            return decision(
                Outcome::Blocked,
                DecisionRule::DenyList,
                format!("'{}' is in the deny-list of '{}'", tag, agent_id),
                None,
            );
        }

        if descriptor.declares_allow_list() && !descriptor.allows(&tag) {
            return decision(
                Outcome::Warned,
                DecisionRule::UndeclaredAction,
                format!("'{}' is not declared in the allow-list of '{}'", tag, agent_id),
                None,
            );
        }

        if descriptor.allows(&tag) {
            decision(
                Outcome::Allowed,
                DecisionRule::AllowList,
                format!("'{}' is declared for '{}'", tag, agent_id),
                None,
            )
        } else {
            decision(
                Outcome::Allowed,
                DecisionRule::OpenScope,
                format!("'{}' declares no allow-list", agent_id),
                None,
            )
        }
    }

    /// Check `action` for whichever agent is active right now.
    ///
    /// The identity is re-read from the session store on every call.
    pub fn check_active(&self, action: &str) -> Result<PermissionDecision, GovernanceError> {
        let identity = self.identity.as_ref().ok_or_else(|| {
            GovernanceError::ConfigError("Scope enforcer has no identity guard".to_string())
        })?;
        match identity.current()? {
            Some(descriptor) => Ok(self.check(&descriptor.id, action)),
            None => {
                let decision = PermissionDecision {
                    agent_id: String::new(),
                    action: normalize_tag(action),
                    outcome: Outcome::Blocked,
                    rule: DecisionRule::NoActiveAgent,
                    reason: "no agent is active; activate one first".to_string(),
                    authorized: None,
                };
                log_decision(&decision);
                Ok(decision)
            }
        }
    }

    pub fn is_allowed(&self, agent_id: &str, action: &str) -> bool {
        self.check(agent_id, action).is_allowed()
    }

    pub fn is_blocked(&self, agent_id: &str, action: &str) -> bool {
        self.check(agent_id, action).is_blocked()
    }

    /// Every action `agent_id` is blocked from, sorted.
    ///
    /// Global blocks, the agent's deny-list, and exclusive actions owned by
    /// someone else.
    pub fn list_blocked_actions(&self, agent_id: &str) -> Vec<ActionTag> {
        let agent_id = agent_id.trim();
        let mut blocked: BTreeSet<ActionTag> = self.globally_blocked.clone();
        if let Some(descriptor) = self.descriptors.find(agent_id) {
            blocked.extend(descriptor.cannot.iter().cloned());
        }
        blocked.extend(
            self.descriptors
                .exclusive_map()
                .into_iter()
                .filter(|(_, owner)| owner != agent_id)
                .map(|(tag, _)| tag),
        );
        blocked.into_iter().collect()
    }
}

fn log_decision(decision: &PermissionDecision) {
    match decision.outcome {
        Outcome::Blocked => warn!(
            agent_id = %decision.agent_id,
            action = %decision.action,
            rule = ?decision.rule,
            reason = %decision.reason,
            "Scope check blocked"
        ),
        Outcome::Warned => info!(
            agent_id = %decision.agent_id,
            action = %decision.action,
            reason = %decision.reason,
            "Scope check warned"
        ),
        Outcome::Allowed => debug!(
            agent_id = %decision.agent_id,
            action = %decision.action,
            "Scope check allowed"
        ),
    }
}
