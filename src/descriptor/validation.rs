//! Descriptor validation owned by the descriptor domain.

use super::model::AgentDescriptor;
use crate::error::GovernanceError;
use crate::types::{ActionTag, AgentId};
use std::collections::{BTreeMap, HashMap};

/// Build the exclusive-tag ownership map, failing on the first overlapping claim.
///
/// Descriptors are visited in id order so the reported conflict is stable.
pub fn exclusive_owners(
    descriptors: &BTreeMap<AgentId, std::sync::Arc<AgentDescriptor>>,
) -> Result<HashMap<ActionTag, AgentId>, GovernanceError> {
    let mut owners: HashMap<ActionTag, AgentId> = HashMap::new();
    for descriptor in descriptors.values() {
        for tag in &descriptor.exclusive {
            if let Some(existing) = owners.get(tag) {
                if existing != &descriptor.id {
                    return Err(GovernanceError::DescriptorConflict {
                        tag: tag.clone(),
                        first: existing.clone(),
                        second: descriptor.id.clone(),
                    });
                }
                continue;
            }
            owners.insert(tag.clone(), descriptor.id.clone());
        }
    }
    Ok(owners)
}

/// Validation result for one descriptor
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub agent_id: String,
    pub checks: Vec<(String, bool)>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new(agent_id: String) -> Self {
        Self {
            agent_id,
            checks: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_check(&mut self, description: &str, passed: bool) {
        self.checks.push((description.to_string(), passed));
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.checks.iter().all(|(_, passed)| *passed)
    }

    pub fn total_checks(&self) -> usize {
        self.checks.len()
    }

    pub fn passed_checks(&self) -> usize {
        self.checks.iter().filter(|(_, passed)| *passed).count()
    }
}

/// Check one loaded descriptor against the rest of the set.
pub fn validate_descriptor(
    descriptor: &AgentDescriptor,
    known_ids: &[&str],
) -> ValidationResult {
    let mut result = ValidationResult::new(descriptor.id.clone());

    if descriptor.source.as_os_str().is_empty() {
        result.add_check("Descriptor defined in code", true);
    } else if descriptor.source.exists() {
        result.add_check("Descriptor file exists", true);

        // The id should match the agent directory or the file stem
        let stem = descriptor.source.file_stem().and_then(|s| s.to_str());
        let parent = descriptor
            .source
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str());
        if stem == Some(descriptor.id.as_str()) || parent == Some(descriptor.id.as_str()) {
            result.add_check("Agent ID matches file or directory name", true);
        } else {
            result.add_error(format!(
                "Agent ID '{}' doesn't match file '{}'",
                descriptor.id,
                descriptor.source.display()
            ));
        }
    } else {
        result.add_error(format!(
            "Descriptor file not found: {}",
            descriptor.source.display()
        ));
    }

    let contradictory: Vec<&ActionTag> = descriptor
        .can
        .iter()
        .filter(|tag| descriptor.cannot.contains(tag))
        .collect();
    if contradictory.is_empty() {
        result.add_check("Allow-list and deny-list are disjoint", true);
    } else {
        result.add_error(format!(
            "Tags both allowed and denied: {}",
            join(&contradictory)
        ));
    }

    let denied_exclusive: Vec<&ActionTag> = descriptor
        .exclusive
        .iter()
        .filter(|tag| descriptor.cannot.contains(tag))
        .collect();
    if denied_exclusive.is_empty() {
        result.add_check("Exclusive actions are not denied", true);
    } else {
        result.add_error(format!(
            "Exclusive tags also in deny-list: {}",
            join(&denied_exclusive)
        ));
    }

    if let Some(ref boss) = descriptor.reports_to {
        if boss == &descriptor.id {
            result.add_error("Agent reports to itself".to_string());
        } else if known_ids.contains(&boss.as_str()) {
            result.add_check("reports_to references a known agent", true);
        } else {
            result.add_error(format!("reports_to references unknown agent '{}'", boss));
        }
    }

    for peer in &descriptor.collaborates_with {
        if !known_ids.contains(&peer.as_str()) {
            result.add_error(format!(
                "collaborates_with references unknown agent '{}'",
                peer
            ));
        }
    }
    if !descriptor.collaborates_with.is_empty() {
        result.add_check(
            "Collaborators resolved",
            descriptor
                .collaborates_with
                .iter()
                .all(|p| known_ids.contains(&p.as_str())),
        );
    }

    result
}

fn join(tags: &[&ActionTag]) -> String {
    tags.iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
