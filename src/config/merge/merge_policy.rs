//! Built-in defaults every config build starts from.
//!
//! Later sources replace scalar keys and whole lists; tables merge key by key.

use crate::audit::DEFAULT_AUDIT_ACTION;
use crate::remediation::DEFAULT_ATTEMPT_TIMEOUT;
use crate::session::DEFAULT_HISTORY_LIMIT;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("session.history_limit", DEFAULT_HISTORY_LIMIT as i64)?
        .set_default("audit.high_threshold", 3_i64)?
        .set_default("audit.validator_timeout_ms", 30_000_i64)?
        .set_default("audit.required_action", DEFAULT_AUDIT_ACTION)?
        .set_default(
            "remediation.attempt_timeout_ms",
            DEFAULT_ATTEMPT_TIMEOUT.as_millis() as i64,
        )?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "file")
}
