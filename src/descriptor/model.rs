//! Agent descriptor shape: raw file layout and the normalized runtime form.

use crate::types::{normalize_tag, normalize_tags, ActionTag, AgentId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity block of a descriptor file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIdentity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Scope block of a descriptor file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScope {
    #[serde(default)]
    pub can: Vec<String>,
    #[serde(default)]
    pub cannot: Vec<String>,
    #[serde(default)]
    pub exclusive: Vec<String>,
}

/// Hierarchy block of a descriptor file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHierarchy {
    #[serde(default)]
    pub reports_to: Option<String>,
    #[serde(default)]
    pub collaborates_with: Vec<String>,
}

/// Descriptor file as written by descriptor authors.
///
/// Unknown fields are ignored so newer descriptor files keep loading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDescriptor {
    #[serde(default, alias = "identity")]
    pub agent: Option<RawIdentity>,
    /// Flat `id` is accepted when no identity block is present
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scope: RawScope,
    #[serde(default)]
    pub hierarchy: RawHierarchy,
    /// Top-level exclusive list, merged with `scope.exclusive`
    #[serde(default)]
    pub exclusive: Vec<String>,
}

/// Loaded agent descriptor
///
/// Immutable once built; the store hands it out behind an `Arc` and replaces
/// the whole set on reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique identifier for the agent
    pub id: AgentId,
    /// Display name (defaults to the id)
    pub name: String,
    /// Ordered allow-list of action tags
    pub can: Vec<ActionTag>,
    /// Deny-list of action tags
    pub cannot: Vec<ActionTag>,
    /// Actions only this agent may perform system-wide
    pub exclusive: Vec<ActionTag>,
    /// Identity this agent escalates to
    pub reports_to: Option<AgentId>,
    /// Peer agent ids
    pub collaborates_with: Vec<AgentId>,
    /// File the descriptor was loaded from
    pub source: PathBuf,
}

impl AgentDescriptor {
    /// Build a descriptor in code, mostly for tests and embedding.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        Self {
            name: id.clone(),
            id,
            can: Vec::new(),
            cannot: Vec::new(),
            exclusive: Vec::new(),
            reports_to: None,
            collaborates_with: Vec::new(),
            source: PathBuf::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_can(mut self, tags: &[&str]) -> Self {
        self.can = normalize_tags(&to_owned(tags));
        self
    }

    pub fn with_cannot(mut self, tags: &[&str]) -> Self {
        self.cannot = normalize_tags(&to_owned(tags));
        self
    }

    pub fn with_exclusive(mut self, tags: &[&str]) -> Self {
        self.exclusive = normalize_tags(&to_owned(tags));
        self
    }

    pub fn with_reports_to(mut self, id: impl Into<String>) -> Self {
        self.reports_to = Some(id.into());
        self
    }

    pub fn with_collaborators(mut self, ids: &[&str]) -> Self {
        self.collaborates_with = to_owned(ids);
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = path.into();
        self
    }

    /// Convert a parsed file into a descriptor.
    pub fn from_raw(raw: RawDescriptor, source: &Path) -> Result<Self, String> {
        let identity = raw.agent.unwrap_or_default();
        let id = identity
            .id
            .or(raw.id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "descriptor is missing required field 'id'".to_string())?;

        if id.chars().any(char::is_whitespace) {
            return Err(format!("descriptor id '{}' must not contain whitespace", id));
        }

        let name = identity
            .name
            .or(raw.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());

        let mut exclusive = raw.scope.exclusive;
        exclusive.extend(raw.exclusive);

        Ok(Self {
            id,
            name,
            can: normalize_tags(&raw.scope.can),
            cannot: normalize_tags(&raw.scope.cannot),
            exclusive: normalize_tags(&exclusive),
            reports_to: raw
                .hierarchy
                .reports_to
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            collaborates_with: raw
                .hierarchy
                .collaborates_with
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            source: source.to_path_buf(),
        })
    }

    /// Whether the descriptor declares an allow-list at all
    pub fn declares_allow_list(&self) -> bool {
        !self.can.is_empty()
    }

    /// Explicitly allowed. Exclusive tags count as allowed for their owner.
    pub fn allows(&self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        self.can.contains(&tag) || self.exclusive.contains(&tag)
    }

    pub fn denies(&self, tag: &str) -> bool {
        self.cannot.contains(&normalize_tag(tag))
    }

    pub fn owns_exclusive(&self, tag: &str) -> bool {
        self.exclusive.contains(&normalize_tag(tag))
    }
}

fn to_owned(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}
