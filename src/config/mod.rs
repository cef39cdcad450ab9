//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → MODPROXY_* environment overrides (loader.rs)
//!     → command-line flags (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc with the fetchers, splitter and server
//! ```
//!
//! # Design Decisions
//! - Config is built once at startup; there is no global mutable copy
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, read_config, ConfigError};
pub use schema::{
    ListenerConfig, ObservabilityConfig, PoolConfig, ProxyConfig, RoutingConfig, SplitPolicy,
    StorageConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
