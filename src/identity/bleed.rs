//! Identity bleed detection.
//!
//! Scans free text for phrases that claim another declared identity
//! ("acting as ops", "speaking as the QA agent") while a different agent holds
//! the session.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Phrases that introduce a claimed identity
const IMPERSONATION_PHRASES: &[&str] = &[
    "acting as",
    "act as",
    "as agent",
    "speaking as",
    "i am",
    "i m",
    "switching to",
    "switch to",
    "on behalf of",
    "pretend to be",
    "pretending to be",
    "roleplay as",
    "role play as",
    "impersonate",
    "impersonating",
];

/// Words allowed between the phrase and the identity
const FILLER_WORDS: &[&str] = &["the", "a", "an", "agent", "role", "persona", "of", "your"];

/// Result of a bleed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleedCheck {
    /// Agent holding the session when the check ran
    pub active_agent: Option<String>,
    /// Declared identity the text claims, when it differs from the active one
    pub impersonated: Option<String>,
    /// Phrase that introduced the claim
    pub phrase: Option<String>,
}

impl BleedCheck {
    pub fn clean(active_agent: Option<String>) -> Self {
        Self {
            active_agent,
            impersonated: None,
            phrase: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.impersonated.is_none()
    }

    pub fn reason(&self) -> String {
        match (&self.impersonated, &self.active_agent) {
            (None, _) => "no identity bleed detected".to_string(),
            (Some(other), Some(active)) => format!(
                "text claims to act as '{}' ({}) while '{}' is active",
                other,
                self.phrase.as_deref().unwrap_or("claim"),
                active
            ),
            (Some(other), None) => format!(
                "text claims to act as '{}' ({}) but no agent is active",
                other,
                self.phrase.as_deref().unwrap_or("claim")
            ),
        }
    }
}

/// Fold text to lowercase words separated by single spaces.
fn fold(text: &str) -> Vec<String> {
    let normalized: String = text
        .nfkc()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Find the first declared identity, other than `active`, that the text claims.
///
/// `identities` pairs each agent id with its display name; both spellings are
/// matched.
pub fn detect_impersonation(
    text: &str,
    identities: &[(String, String)],
    active: Option<&str>,
) -> BleedCheck {
    let words = fold(text);
    let phrases: Vec<Vec<String>> = IMPERSONATION_PHRASES.iter().map(|p| fold(p)).collect();

    // Longest spellings first so "product manager" wins over "product"
    let mut spellings: Vec<(Vec<String>, &str)> = identities
        .iter()
        .flat_map(|(id, name)| [(fold(id), id.as_str()), (fold(name), id.as_str())])
        .filter(|(words, _)| !words.is_empty())
        .collect();
    spellings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    for start in 0..words.len() {
        for (phrase, raw_phrase) in phrases.iter().zip(IMPERSONATION_PHRASES) {
            if !starts_with(&words[start..], phrase) {
                continue;
            }
            let mut cursor = start + phrase.len();
            let mut skipped = 0;
            while cursor < words.len() && skipped < 2 && FILLER_WORDS.contains(&words[cursor].as_str()) {
                cursor += 1;
                skipped += 1;
            }
            let rest = &words[cursor.min(words.len())..];
            if let Some((_, agent_id)) = spellings.iter().find(|(s, _)| starts_with(rest, s)) {
                if Some(*agent_id) != active {
                    return BleedCheck {
                        active_agent: active.map(str::to_string),
                        impersonated: Some(agent_id.to_string()),
                        phrase: Some(raw_phrase.to_string()),
                    };
                }
            }
        }
    }
    BleedCheck::clean(active.map(str::to_string))
}

fn starts_with(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && haystack.len() >= needle.len() && haystack[..needle.len()] == *needle
}
