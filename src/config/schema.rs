//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the module proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Origin proxy the upstream fetcher talks to.
    pub upstream: UpstreamConfig,

    /// Local cache and toolchain settings.
    pub storage: StorageConfig,

    /// Source selection policy.
    pub routing: RoutingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request context pool settings.
    pub pool: PoolConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the origin proxy.
    pub url: String,

    /// Total request timeout in seconds (covers streaming the body).
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://proxy.golang.org".to_string(),
            timeout_secs: 60,
            connect_timeout_secs: 5,
        }
    }
}

/// Local cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the private toolchain workspace (used as GOPATH).
    pub cache_root: PathBuf,

    /// Toolchain binary used for listing and materializing modules.
    pub go_binary: String,

    /// Deadline for a single toolchain invocation in seconds.
    pub command_timeout_secs: u64,

    /// Extra environment passed to the toolchain (e.g. GOPRIVATE).
    pub env: BTreeMap<String, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_root: std::env::temp_dir().join(".modproxy").join("storage"),
            go_binary: "go".to_string(),
            command_timeout_secs: 300,
            env: BTreeMap::new(),
        }
    }
}

/// Source selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Always try upstream first.
    #[default]
    Upstream,
    /// Local-only for modules matching `routing.local`.
    Patterns,
    /// Like `patterns`, plus an HTTP probe of the module host.
    Probe,
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Policy selecting the preferred source.
    pub policy: SplitPolicy,

    /// Module patterns served from the local cache only. Entries containing
    /// `/` are address prefixes, the rest are domains (`*.` allowed).
    pub local: Vec<String>,

    /// Probe timeout in seconds (probe policy only).
    pub probe_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            policy: SplitPolicy::Upstream,
            local: Vec::new(),
            probe_timeout_secs: 3,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to produce response headers, in seconds. Includes local
    /// materialization, so it is generous.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 600 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request context pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle contexts kept for reuse.
    pub max_idle_contexts: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_contexts: 1024,
        }
    }
}
