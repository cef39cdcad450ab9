//! Source orchestration.
//!
//! # Responsibilities
//! - Ask the splitter which source to try first
//! - Try the upstream, fall back to the local cache once on any failure
//! - Buffer small resources, pass archives through as streams
//!
//! # Design Decisions
//! - Never race the two sources; attempts are strictly sequential
//! - Only the last attempt's error is surfaced
//! - Small resources are buffered inside the attempt, so a truncated
//!   upstream body still triggers the fallback

use std::sync::Arc;

use axum::body::Bytes;

use crate::fetch::{FetchError, Fetcher, ModuleStream, Source};
use crate::module::{ParsedRequest, RequestKind};
use crate::observability::metrics;
use crate::routing::{Route, Splitter};

/// Body of a successful dispatch.
#[derive(Debug)]
pub enum Payload {
    /// Fully read text or JSON.
    Buffered(Bytes),
    /// Archive bytes passed through unbuffered.
    Streaming(ModuleStream),
}

/// A resource produced by one of the sources.
#[derive(Debug)]
pub struct Fetched {
    pub kind: RequestKind,
    pub source: Source,
    pub payload: Payload,
}

/// The terminal failure of a dispatch: the error of the last source tried.
#[derive(Debug)]
pub struct DispatchError {
    pub kind: RequestKind,
    pub source: Source,
    pub error: FetchError,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Routes parsed requests to the upstream and local fetchers.
#[derive(Clone)]
pub struct Dispatcher {
    upstream: Arc<dyn Fetcher>,
    local: Arc<dyn Fetcher>,
    splitter: Arc<dyn Splitter>,
}

impl Dispatcher {
    pub fn new(
        upstream: Arc<dyn Fetcher>,
        local: Arc<dyn Fetcher>,
        splitter: Arc<dyn Splitter>,
    ) -> Self {
        Self {
            upstream,
            local,
            splitter,
        }
    }

    /// Produce the resource for `request`.
    pub async fn dispatch(&self, request: &ParsedRequest) -> Result<Fetched, DispatchError> {
        let kind = request.kind();
        let route = self.splitter.split(request).await;
        tracing::debug!(module = %request.module(), kind = %kind, ?route, "Dispatching request");

        if route == Route::PreferUpstream {
            match self.attempt(self.upstream.as_ref(), request).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) => {
                    tracing::warn!(
                        module = %request.module(),
                        kind = %kind,
                        not_found = e.is_not_found(),
                        error = %e,
                        "Upstream failed, falling back to local cache"
                    );
                    metrics::record_fallback(kind);
                }
            }
        }

        self.attempt(self.local.as_ref(), request).await.map_err(|error| {
            tracing::error!(
                module = %request.module(),
                kind = %kind,
                error = %error,
                "Request failed"
            );
            DispatchError {
                kind,
                source: self.local.source(),
                error,
            }
        })
    }

    async fn attempt(
        &self,
        fetcher: &dyn Fetcher,
        request: &ParsedRequest,
    ) -> Result<Fetched, FetchError> {
        let source = fetcher.source();
        let result = Self::read(fetcher, request).await;
        match &result {
            Ok(_) => metrics::record_fetch(source, "ok"),
            Err(e) => metrics::record_fetch(source, e.label()),
        }
        Ok(Fetched {
            kind: request.kind(),
            source,
            payload: result?,
        })
    }

    async fn read(fetcher: &dyn Fetcher, request: &ParsedRequest) -> Result<Payload, FetchError> {
        let stream = fetcher.fetch(request.module(), request.kind()).await?;
        if request.kind() == RequestKind::Archive {
            return Ok(Payload::Streaming(stream));
        }
        Ok(Payload::Buffered(stream.read_to_end().await?))
    }
}
