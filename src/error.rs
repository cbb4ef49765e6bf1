//! Error types for the governance runtime.
//!
//! Only structural problems (descriptor conflicts, malformed configuration,
//! I/O failures) travel through these types. Runtime decisions such as a
//! blocked action or an escalated finding are returned as data.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the governance runtime
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Two descriptors claim the same exclusive action tag
    #[error("Exclusive action '{tag}' is claimed by both '{first}' and '{second}'")]
    DescriptorConflict {
        tag: String,
        first: String,
        second: String,
    },

    #[error("Agent descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("Invalid descriptor {path}: {reason}")]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("Descriptor directory not found: {0}")]
    DescriptorDirMissing(PathBuf),

    /// Activation requested while a different identity holds the session
    #[error("Agent '{active}' is already active; deactivate it before activating '{requested}'")]
    IdentityConflict { active: String, requested: String },

    #[error("Session persistence failed: {0}")]
    SessionPersistence(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validator error: {0}")]
    ValidatorError(String),

    #[error("Remediation error: {0}")]
    RemediationError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for GovernanceError {
    fn from(err: serde_json::Error) -> Self {
        GovernanceError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for GovernanceError {
    fn from(err: config::ConfigError) -> Self {
        GovernanceError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
