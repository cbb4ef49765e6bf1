//! Environment variable source: WARDEN__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Keys whose env values are comma-separated lists
const LIST_KEYS: &[&str] = &["scope.globally_blocked"];

/// Environment source for `WARDEN__SECTION__KEY` variables.
///
/// `WARDEN__SCOPE__GLOBALLY_BLOCKED=a,b` sets a list. Single-underscore
/// variables such as `WARDEN_LOG` belong to logging and are not read here.
pub fn source() -> Environment {
    LIST_KEYS.iter().fold(
        Environment::with_prefix("WARDEN")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .try_parsing(true),
        |env, key| env.with_list_parse_key(key),
    )
}

/// Add environment variable overlay to builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(source()))
}
