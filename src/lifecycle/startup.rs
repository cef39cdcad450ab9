//! Startup orchestration.
//!
//! # Responsibilities
//! - Prepare the cache root
//! - Initialize subsystems in dependency order
//! - Assemble the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners are bound by the caller, after assembly succeeds

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::dispatch::Dispatcher;
use crate::fetch::{FetchError, GoToolchain, LocalFetcher, UpstreamFetcher};
use crate::http::HttpServer;
use crate::routing::splitter;

/// Error type for startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot create cache root {path}: {source}")]
    CacheRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build upstream client: {0}")]
    Upstream(#[from] FetchError),

    #[error("cannot build routing policy: {0}")]
    Routing(#[from] reqwest::Error),
}

/// Build the server described by `config`.
pub async fn build(config: ProxyConfig) -> Result<HttpServer, StartupError> {
    let root = config.storage.cache_root.clone();
    tokio::fs::create_dir_all(&root)
        .await
        .map_err(|source| StartupError::CacheRoot {
            path: root.clone(),
            source,
        })?;

    let toolchain = Arc::new(GoToolchain::new(&config.storage));
    let local = Arc::new(LocalFetcher::new(&root, toolchain));
    let upstream = Arc::new(UpstreamFetcher::new(&config.upstream)?);
    let splitter = splitter::from_config(&config.routing)?;

    tracing::info!(
        cache_root = %root.display(),
        upstream = %config.upstream.url,
        policy = ?config.routing.policy,
        "Subsystems initialized"
    );

    let dispatcher = Dispatcher::new(upstream, local, splitter);
    Ok(HttpServer::new(config, dispatcher))
}
