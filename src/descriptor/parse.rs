//! Descriptor file parsing.
//!
//! A descriptor is either a plain YAML file or a Markdown file carrying its
//! structured block as front matter (`---` ... `---`) or as the first fenced
//! ```` ```yaml ```` block.

use super::model::{AgentDescriptor, RawDescriptor};
use crate::error::{GovernanceError, Result};
use std::path::Path;

/// Extensions considered when scanning a descriptor directory
pub const DESCRIPTOR_EXTENSIONS: &[&str] = &["yaml", "yml", "md"];

pub fn is_descriptor_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DESCRIPTOR_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read and parse one descriptor file.
///
/// Any failure is reported as `InvalidDescriptor` naming the file.
pub fn parse_descriptor_file(path: &Path) -> Result<AgentDescriptor> {
    let invalid = |reason: String| GovernanceError::InvalidDescriptor {
        path: path.to_path_buf(),
        reason,
    };
    let content = std::fs::read_to_string(path).map_err(|e| invalid(format!("unreadable: {}", e)))?;
    parse_descriptor_str(&content, path).map_err(invalid)
}

/// Parse descriptor content; `path` decides how the structured block is located.
pub fn parse_descriptor_str(content: &str, path: &Path) -> std::result::Result<AgentDescriptor, String> {
    let is_markdown = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false);

    let block = if is_markdown {
        extract_structured_block(content)
            .ok_or_else(|| "no structured descriptor block found".to_string())?
    } else {
        content.to_string()
    };

    let raw: RawDescriptor =
        serde_yaml::from_str(&block).map_err(|e| format!("invalid descriptor block: {}", e))?;
    AgentDescriptor::from_raw(raw, path)
}

/// Locate the structured block inside a Markdown descriptor.
pub fn extract_structured_block(content: &str) -> Option<String> {
    let mut lines = content.lines();

    // Front matter must open on the first line
    if content.trim_start_matches('\u{feff}').starts_with("---") {
        let _ = lines.next();
        let mut block = Vec::new();
        for line in lines.by_ref() {
            if line.trim_end() == "---" {
                return Some(block.join("\n"));
            }
            block.push(line);
        }
        return None;
    }

    let mut in_block = false;
    let mut block = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if !in_block {
            if trimmed == "```yaml" || trimmed == "```yml" {
                in_block = true;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            return Some(block.join("\n"));
        }
        block.push(line);
    }
    None
}
