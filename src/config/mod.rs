pub mod options;

pub use options::{
    config_options, find_option, metadata, ConfigOptionSchema, ModuleMetadata, OptionKind,
    OptionSpec, CONFIG_OPTIONS,
};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Call timeout used when nothing else is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_USER_AGENT: &str = "Pelican-WHMCS";

/// Default config file location: ~/.pelican-whmcs/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pelican-whmcs")
        .join("config.yaml")
}

/// Errors for config file I/O and parsing
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to expand path {0}: {1}")]
    PathExpansion(String, String),
}

/// Transport settings shared by every panel call.
///
/// Panel address and token are not part of this: the host supplies them with
/// every lifecycle call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleConfig {
    /// Per-call timeout; a timed out call reports status 0
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Verify the panel's TLS certificate
    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verify_tls: true,
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse config from YAML string
pub fn parse_config(content: &str) -> Result<ModuleConfig, ConfigError> {
    if content.trim().is_empty() {
        return Ok(ModuleConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Apply `PELICAN_*` overrides from a variable lookup
pub fn apply_overrides<F>(mut config: ModuleConfig, lookup: F) -> Result<ModuleConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("PELICAN_TIMEOUT") {
        config.timeout_secs = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: "PELICAN_TIMEOUT".to_string(),
            value: value.clone(),
        })?;
    }
    if let Some(value) = lookup("PELICAN_USER_AGENT") {
        if !value.is_empty() {
            config.user_agent = value;
        }
    }
    if let Some(value) = lookup("PELICAN_VERIFY_TLS") {
        config.verify_tls = parse_bool("PELICAN_VERIFY_TLS", &value)?;
    }
    Ok(config)
}

/// Expand `~` and `$VAR` in a user-supplied path
pub fn expand_path(path: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::PathExpansion(path.to_string(), e.to_string()))
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load the module config.
///
/// An explicit path must exist; the default path is optional. Environment
/// overrides are applied last.
pub fn load_config(path: Option<&Path>) -> Result<ModuleConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => {
            let default = default_config_path();
            if default.exists() {
                parse_config(&std::fs::read_to_string(default)?)?
            } else {
                ModuleConfig::default()
            }
        }
    };
    apply_overrides(config, |key| std::env::var(key).ok())
}
