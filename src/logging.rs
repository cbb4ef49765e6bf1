//! Logging System
//!
//! Structured logging through `tracing`. Level, format and destination come
//! from the `[logging]` config section and can be overridden with `WARDEN_LOG*`
//! environment variables or CLI flags.

use crate::config::xdg;
use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Resolve the log file path with precedence: CLI, WARDEN_LOG_FILE env, config file, default.
///
/// The default lives in the platform state directory, scoped by workspace path
/// when one is given.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    workspace: Option<&Path>,
) -> Result<PathBuf, GovernanceError> {
    if let Some(p) = cli_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    if let Ok(env_path) = std::env::var("WARDEN_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    default_log_file_path(workspace)
}

fn default_log_file_path(workspace: Option<&Path>) -> Result<PathBuf, GovernanceError> {
    let project_dirs = directories::ProjectDirs::from("", "warden", "warden").ok_or_else(|| {
        GovernanceError::ConfigError(
            "Could not determine platform state directory for log file".to_string(),
        )
    })?;
    let state_dir = project_dirs.state_dir().ok_or_else(|| {
        GovernanceError::ConfigError("Platform state directory not available for log file".to_string())
    })?;
    let dir = match workspace {
        Some(ws) => xdg::join_workspace_segments(state_dir, ws)?,
        None => state_dir.to_path_buf(),
    };
    Ok(dir.join("warden.log"))
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base filter level (`trace` through `error`, or `off`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_format")]
    pub format: String,

    /// `stdout`, `stderr`, `file`, `file+stderr` or `both`
    #[serde(default = "default_output")]
    pub output: String,

    /// Explicit log file; the platform state directory is used when unset
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// ANSI colors for terminal output. Never applied to files.
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-target levels, e.g. `warden::scope = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    LogFormat::Text.as_str().to_string()
}

// Hook callers read stdout, so logs stay off it by default.
fn default_output() -> String {
    "file".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Event encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(GovernanceError::ConfigError(format!(
                "Invalid log format '{}': expected 'text' or 'json'",
                other
            ))),
        }
    }
}

/// Where events are written
#[derive(Debug, PartialEq, Eq)]
struct Destinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl FromStr for Destinations {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stdout, stderr, file) = match s.trim() {
            "stdout" => (true, false, false),
            "stderr" => (false, true, false),
            "file" => (false, false, true),
            "file+stderr" => (false, true, true),
            "both" => (true, true, false),
            other => {
                return Err(GovernanceError::ConfigError(format!(
                    "Invalid log output '{}': expected stdout, stderr, file, file+stderr or both",
                    other
                )))
            }
        };
        Ok(Self { stdout, stderr, file })
    }
}

/// Install the global subscriber.
///
/// `WARDEN_LOG`, `WARDEN_LOG_FORMAT`, `WARDEN_LOG_OUTPUT` and
/// `WARDEN_LOG_MODULES` take precedence over `config`; CLI flags are folded
/// into `config` by the binary before this is called. Fails if a subscriber is
/// already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), GovernanceError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    let already =
        |e: TryInitError| GovernanceError::ConfigError(format!("Logging already initialized: {}", e));

    if !config.enabled {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
            .map_err(already);
    }

    let filter = env_filter(config)?;
    let format: LogFormat = match std::env::var("WARDEN_LOG_FORMAT") {
        Ok(value) => value.parse()?,
        Err(_) => config.format.parse()?,
    };
    let destinations: Destinations = match std::env::var("WARDEN_LOG_OUTPUT") {
        Ok(value) => value.parse()?,
        Err(_) => config.output.parse()?,
    };
    let ansi = config.color && !destinations.file;
    let writer = make_writer(&destinations, config)?;

    let registry = Registry::default().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    }
    .map_err(already)
}

fn make_writer(destinations: &Destinations, config: &LoggingConfig) -> Result<BoxMakeWriter, GovernanceError> {
    let writer = match (destinations.file, destinations.stdout, destinations.stderr) {
        (true, _, true) => BoxMakeWriter::new(open_log_file(config)?.and(std::io::stderr)),
        (true, _, false) => BoxMakeWriter::new(open_log_file(config)?),
        (false, true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        (false, false, true) => BoxMakeWriter::new(std::io::stderr),
        (false, _, false) => BoxMakeWriter::new(std::io::stdout),
    };
    Ok(writer)
}

fn open_log_file(config: &LoggingConfig) -> Result<Arc<File>, GovernanceError> {
    let path = resolve_log_file_path(None, config.file.clone(), None)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            GovernanceError::ConfigError(format!("Failed to create log directory {}: {}", parent.display(), e))
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| GovernanceError::ConfigError(format!("Failed to open log file {}: {}", path.display(), e)))?;
    Ok(Arc::new(file))
}

/// `WARDEN_LOG` replaces the whole filter; otherwise level plus module directives.
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, GovernanceError> {
    if let Ok(filter) = EnvFilter::try_from_env("WARDEN_LOG") {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (target, level) in &config.modules {
        filter = filter.add_directive(parse_directive(target, level)?);
    }
    // WARDEN_LOG_MODULES=warden::scope=debug,warden::audit=trace
    if let Ok(modules) = std::env::var("WARDEN_LOG_MODULES") {
        for (target, level) in modules.split(',').filter_map(|entry| entry.split_once('=')) {
            filter = filter.add_directive(parse_directive(target.trim(), level.trim())?);
        }
    }
    Ok(filter)
}

fn parse_directive(target: &str, level: &str) -> Result<Directive, GovernanceError> {
    format!("{}={}", target, level)
        .parse()
        .map_err(|e| GovernanceError::ConfigError(format!("Invalid log directive '{}={}': {}", target, level, e)))
}
