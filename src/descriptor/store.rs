//! Descriptor store: loads, indexes and validates agent descriptors.

use super::model::AgentDescriptor;
use super::parse::{is_descriptor_file, parse_descriptor_file};
use super::validation::{exclusive_owners, validate_descriptor, ValidationResult};
use crate::error::GovernanceError;
use crate::types::{normalize_tag, ActionTag, AgentId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A descriptor file that was rejected during load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDescriptor {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a successful load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<SkippedDescriptor>,
}

/// Immutable snapshot of the loaded descriptor set
#[derive(Debug, Default)]
struct DescriptorIndex {
    by_id: BTreeMap<AgentId, Arc<AgentDescriptor>>,
    exclusive: HashMap<ActionTag, AgentId>,
}

impl DescriptorIndex {
    fn build(descriptors: Vec<AgentDescriptor>) -> Result<(Self, Vec<SkippedDescriptor>), GovernanceError> {
        let mut by_id = BTreeMap::new();
        let mut skipped = Vec::new();
        for descriptor in descriptors {
            if by_id.contains_key(&descriptor.id) {
                warn!(
                    agent_id = %descriptor.id,
                    path = %descriptor.source.display(),
                    "Duplicate agent id, skipping descriptor"
                );
                skipped.push(SkippedDescriptor {
                    path: descriptor.source.clone(),
                    reason: format!("duplicate agent id '{}'", descriptor.id),
                });
                continue;
            }
            by_id.insert(descriptor.id.clone(), Arc::new(descriptor));
        }
        let exclusive = exclusive_owners(&by_id)?;
        Ok((Self { by_id, exclusive }, skipped))
    }
}

/// Descriptor store
///
/// Readers get a consistent snapshot; a reload swaps the whole index at once
/// and only after the new set passed the exclusivity check.
pub struct DescriptorStore {
    index: RwLock<Arc<DescriptorIndex>>,
    directory: RwLock<Option<PathBuf>>,
}

impl DescriptorStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Arc::new(DescriptorIndex::default())),
            directory: RwLock::new(None),
        }
    }

    /// Create a store from descriptors built in code
    pub fn from_descriptors(descriptors: Vec<AgentDescriptor>) -> Result<Self, GovernanceError> {
        let store = Self::new();
        store.replace(descriptors)?;
        Ok(store)
    }

    /// Replace the index with descriptors built in code.
    pub fn replace(&self, descriptors: Vec<AgentDescriptor>) -> Result<LoadReport, GovernanceError> {
        let (index, skipped) = DescriptorIndex::build(descriptors)?;
        let loaded = index.by_id.len();
        *self.index.write() = Arc::new(index);
        Ok(LoadReport { loaded, skipped })
    }

    /// Load every descriptor under `directory`, replacing the current index.
    ///
    /// Malformed files are skipped and reported. An exclusivity conflict fails
    /// the whole load and leaves the previous index in place.
    pub fn load(&self, directory: &Path) -> Result<LoadReport, GovernanceError> {
        if !directory.is_dir() {
            return Err(GovernanceError::DescriptorDirMissing(directory.to_path_buf()));
        }
        let root = dunce::canonicalize(directory)?;

        let mut skipped = Vec::new();
        let mut descriptors = Vec::new();
        for (group, candidates) in scan_candidates(&root) {
            match load_group(&group, &root, candidates) {
                GroupOutcome::Loaded(found, mut rejected) => {
                    descriptors.extend(found);
                    skipped.append(&mut rejected);
                }
                GroupOutcome::Rejected(mut rejected) => skipped.append(&mut rejected),
            }
        }

        let (index, mut duplicates) = DescriptorIndex::build(descriptors).map_err(|e| {
            warn!(directory = %root.display(), error = %e, "Descriptor load aborted");
            e
        })?;
        skipped.append(&mut duplicates);

        let loaded = index.by_id.len();
        *self.index.write() = Arc::new(index);
        *self.directory.write() = Some(root.clone());

        info!(
            directory = %root.display(),
            loaded,
            skipped = skipped.len(),
            "Loaded agent descriptors"
        );
        Ok(LoadReport { loaded, skipped })
    }

    /// Reload from the directory of the last successful load
    pub fn reload(&self) -> Result<LoadReport, GovernanceError> {
        let directory = self.directory.read().clone().ok_or_else(|| {
            GovernanceError::ConfigError("Descriptor store was never loaded from disk".to_string())
        })?;
        self.load(&directory)
    }

    /// Directory of the last successful load
    pub fn directory(&self) -> Option<PathBuf> {
        self.directory.read().clone()
    }

    /// Get a descriptor by id
    pub fn get(&self, id: &str) -> Result<Arc<AgentDescriptor>, GovernanceError> {
        self.find(id)
            .ok_or_else(|| GovernanceError::DescriptorNotFound(id.to_string()))
    }

    pub fn find(&self, id: &str) -> Option<Arc<AgentDescriptor>> {
        self.index.read().by_id.get(id.trim()).cloned()
    }

    /// All descriptors, sorted by id
    pub fn all(&self) -> Vec<Arc<AgentDescriptor>> {
        self.index.read().by_id.values().cloned().collect()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.index.read().by_id.contains_key(id.trim())
    }

    /// Owner of an exclusive action tag, if any
    pub fn exclusive_owner(&self, tag: &str) -> Option<AgentId> {
        self.index.read().exclusive.get(&normalize_tag(tag)).cloned()
    }

    /// Exclusive tags and their owners, sorted by tag
    pub fn exclusive_map(&self) -> BTreeMap<ActionTag, AgentId> {
        self.index
            .read()
            .exclusive
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().by_id.is_empty()
    }

    /// Validate one descriptor against the loaded set
    pub fn validate(&self, id: &str) -> Result<ValidationResult, GovernanceError> {
        let index = self.index.read().clone();
        let descriptor = index
            .by_id
            .get(id.trim())
            .ok_or_else(|| GovernanceError::DescriptorNotFound(id.to_string()))?;
        let known: Vec<&str> = index.by_id.keys().map(|k| k.as_str()).collect();
        Ok(validate_descriptor(descriptor, &known))
    }

    /// Validate every loaded descriptor
    pub fn validate_all(&self) -> Vec<ValidationResult> {
        let index = self.index.read().clone();
        let known: Vec<&str> = index.by_id.keys().map(|k| k.as_str()).collect();
        index
            .by_id
            .values()
            .map(|d| validate_descriptor(d, &known))
            .collect()
    }
}

impl Default for DescriptorStore {
    fn default() -> Self {
        Self::new()
    }
}

enum GroupOutcome {
    Loaded(Vec<AgentDescriptor>, Vec<SkippedDescriptor>),
    Rejected(Vec<SkippedDescriptor>),
}

/// Group candidate files by containing directory, in path order.
fn scan_candidates(root: &Path) -> BTreeMap<PathBuf, Vec<PathBuf>> {
    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(false)
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Failed to read descriptor directory entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_descriptor_file(path) {
            continue;
        }
        let parent = path.parent().unwrap_or(root).to_path_buf();
        groups.entry(parent).or_default().push(path.to_path_buf());
    }
    groups
}

/// Load one directory group.
///
/// Files directly under the root are independent descriptors. Inside an agent
/// subdirectory exactly one descriptor is taken: `agent.*` or `<dir>.*` first,
/// then the remaining files in name order; the first that parses wins.
fn load_group(group: &Path, root: &Path, mut candidates: Vec<PathBuf>) -> GroupOutcome {
    if group == root {
        let mut found = Vec::new();
        let mut rejected = Vec::new();
        for path in candidates {
            match parse_descriptor_file(&path) {
                Ok(d) => found.push(d),
                Err(e) => rejected.push(reject(&path, e)),
            }
        }
        return GroupOutcome::Loaded(found, rejected);
    }

    let dir_name = group
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    candidates.sort_by_key(|p| {
        let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let preferred = stem == "agent" || stem == dir_name;
        (!preferred, p.clone())
    });

    let mut errors = Vec::new();
    for path in &candidates {
        match parse_descriptor_file(path) {
            Ok(descriptor) => {
                for other in candidates.iter().filter(|p| *p != path) {
                    debug!(
                        path = %other.display(),
                        chosen = %path.display(),
                        "Ignoring extra file in agent directory"
                    );
                }
                // Broken files ranked ahead of the winner still count as skipped
                return GroupOutcome::Loaded(vec![descriptor], errors);
            }
            Err(e) => errors.push(reject(path, e)),
        }
    }
    GroupOutcome::Rejected(errors)
}

fn reject(path: &Path, error: GovernanceError) -> SkippedDescriptor {
    let reason = match error {
        GovernanceError::InvalidDescriptor { reason, .. } => reason,
        other => other.to_string(),
    };
    warn!(path = %path.display(), reason = %reason, "Skipping malformed descriptor");
    SkippedDescriptor {
        path: path.to_path_buf(),
        reason,
    }
}
