//! Source selection policies.
//!
//! # Responsibilities
//! - Decide per request whether the local cache or the upstream is tried first
//! - Honour deployment-specific local-only module patterns
//!
//! # Design Decisions
//! - The default policy is pure: no I/O, no state
//! - Network probing exists only as an explicit opt-in policy
//! - A decision is computed per request and never stored

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::{RoutingConfig, SplitPolicy};
use crate::module::ParsedRequest;
use crate::routing::matcher::{AnyMatcher, ModuleMatcher};

/// Which source to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Local cache only; no upstream attempt.
    PreferLocal,
    /// Upstream first, local as fallback.
    PreferUpstream,
}

/// Maps a parsed request to a routing decision.
#[async_trait]
pub trait Splitter: Send + Sync {
    async fn split(&self, request: &ParsedRequest) -> Route;
}

/// Always prefers the upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpstreamFirst;

#[async_trait]
impl Splitter for UpstreamFirst {
    async fn split(&self, _request: &ParsedRequest) -> Route {
        Route::PreferUpstream
    }
}

/// Serves matching modules locally, everything else upstream first.
#[derive(Debug, Default)]
pub struct PatternSplitter {
    local: AnyMatcher,
}

impl PatternSplitter {
    pub fn new(local: AnyMatcher) -> Self {
        Self { local }
    }

    fn decide(&self, request: &ParsedRequest) -> Option<Route> {
        self.local.matches(request.module()).then_some(Route::PreferLocal)
    }
}

#[async_trait]
impl Splitter for PatternSplitter {
    async fn split(&self, request: &ParsedRequest) -> Route {
        self.decide(request).unwrap_or(Route::PreferUpstream)
    }
}

/// Probes the module host; unreachable hosts are treated as private.
#[derive(Debug)]
pub struct ProbeSplitter {
    patterns: PatternSplitter,
    client: reqwest::Client,
    scheme: &'static str,
}

impl ProbeSplitter {
    pub fn new(local: AnyMatcher, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(3))
            .build()?;
        Ok(Self {
            patterns: PatternSplitter::new(local),
            client,
            scheme: "https",
        })
    }

    /// Probe over plain HTTP instead of HTTPS.
    pub fn insecure(mut self) -> Self {
        self.scheme = "http";
        self
    }
}

#[async_trait]
impl Splitter for ProbeSplitter {
    async fn split(&self, request: &ParsedRequest) -> Route {
        if let Some(route) = self.patterns.decide(request) {
            return route;
        }

        let url = format!("{}://{}", self.scheme, request.module().address());
        match self.client.head(&url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => Route::PreferUpstream,
            Ok(resp) => {
                tracing::debug!(
                    url = %url,
                    status = %resp.status(),
                    "Probe failed, routing locally"
                );
                Route::PreferLocal
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Probe failed, routing locally");
                Route::PreferLocal
            }
        }
    }
}

/// Build the configured policy.
pub fn from_config(config: &RoutingConfig) -> Result<Arc<dyn Splitter>, reqwest::Error> {
    let local = AnyMatcher::from_patterns(&config.local);
    let splitter: Arc<dyn Splitter> = match config.policy {
        SplitPolicy::Upstream => Arc::new(UpstreamFirst),
        SplitPolicy::Patterns => Arc::new(PatternSplitter::new(local)),
        SplitPolicy::Probe => Arc::new(ProbeSplitter::new(
            local,
            Duration::from_secs(config.probe_timeout_secs),
        )?),
    };
    Ok(splitter)
}
