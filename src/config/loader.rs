//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Upstream origin base URL.
pub const ENV_UPSTREAM_URL: &str = "MODPROXY_UPSTREAM_URL";
/// Local cache root directory.
pub const ENV_CACHE_ROOT: &str = "MODPROXY_CACHE_ROOT";
/// Listen address.
pub const ENV_LISTEN_ADDR: &str = "MODPROXY_LISTEN_ADDR";
/// Toolchain binary.
pub const ENV_GO_BINARY: &str = "MODPROXY_GO_BINARY";
/// Log level.
pub const ENV_LOG_LEVEL: &str = "MODPROXY_LOG_LEVEL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file into a configuration, without validation.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so callers can inject values.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_UPSTREAM_URL) {
        config.upstream.url = url;
    }
    if let Some(root) = get(ENV_CACHE_ROOT) {
        config.storage.cache_root = root.into();
    }
    if let Some(addr) = get(ENV_LISTEN_ADDR) {
        config.listener.bind_address = addr;
    }
    if let Some(binary) = get(ENV_GO_BINARY) {
        config.storage.go_binary = binary;
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.observability.log_level = level;
    }
}

/// Load configuration: defaults, then the optional file, then the process
/// environment, then `overrides` (command-line flags). The result is
/// validated.
pub fn load_config<F>(path: Option<&Path>, overrides: F) -> Result<ProxyConfig, ConfigError>
where
    F: FnOnce(&mut ProxyConfig),
{
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    overrides(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
