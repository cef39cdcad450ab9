//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs parse
//! - Validate value ranges (timeouts > 0)
//! - Check routing patterns are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, SplitPolicy};
use crate::module::ESCAPE_MARKER;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.url: {0}")]
    InvalidUpstream(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("storage.go_binary must not be empty")]
    EmptyBinary,

    #[error("routing.local: invalid pattern {0:?}")]
    InvalidPattern(String),

    #[error("routing.policy = \"patterns\" requires at least one routing.local pattern")]
    NoPatterns,
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        Ok(url) => errors.push(ValidationError::InvalidUpstream(format!(
            "unsupported url {url}, expected http(s)://host"
        ))),
        Err(e) => errors.push(ValidationError::InvalidUpstream(e.to_string())),
    }

    let non_zero = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("upstream.timeout_secs", config.upstream.timeout_secs),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("storage.command_timeout_secs", config.storage.command_timeout_secs),
        ("routing.probe_timeout_secs", config.routing.probe_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.storage.go_binary.trim().is_empty() {
        errors.push(ValidationError::EmptyBinary);
    }

    for pattern in &config.routing.local {
        let trimmed = pattern.trim().trim_matches('/');
        if trimmed.is_empty() || trimmed == "*." || trimmed.contains(ESCAPE_MARKER) {
            errors.push(ValidationError::InvalidPattern(pattern.clone()));
        }
    }
    if config.routing.policy == SplitPolicy::Patterns && config.routing.local.is_empty() {
        errors.push(ValidationError::NoPatterns);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
