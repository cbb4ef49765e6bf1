//! Core types shared across the governance runtime.

use unicode_normalization::UnicodeNormalization;

/// AgentId: Unique identifier of a declared agent
pub type AgentId = String;

/// ActionTag: Normalized name of a privileged action (e.g. `publish_release`)
pub type ActionTag = String;

/// Normalize an action tag so descriptor authors and callers agree on spelling.
///
/// Applies NFKC, trims, lowercases, and folds `-` and whitespace runs to `_`.
/// `Publish Release`, `publish-release` and `publish_release` are the same tag.
pub fn normalize_tag(raw: &str) -> ActionTag {
    let folded: String = raw.nfkc().collect::<String>().trim().to_lowercase();
    let mut out = String::with_capacity(folded.len());
    let mut last_sep = false;
    for ch in folded.chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            if !last_sep && !out.is_empty() {
                out.push('_');
            }
            last_sep = true;
        } else {
            out.push(ch);
            last_sep = false;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Normalize a list of tags, dropping empties and duplicates while keeping order.
pub fn normalize_tags(raw: &[String]) -> Vec<ActionTag> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
