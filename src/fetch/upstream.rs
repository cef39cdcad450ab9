//! Upstream fetcher: another instance of the module proxy protocol.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use url::Url;

use crate::config::UpstreamConfig;
use crate::fetch::{FetchError, Fetcher, ModuleStream, Source};
use crate::module::{ModuleIdentity, RequestKind};

/// Fetches resources from the configured origin proxy over HTTP(S).
#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    base: String,
    client: reqwest::Client,
}

impl UpstreamFetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("modproxy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(&config.url, client))
    }

    /// Use an existing client.
    pub fn with_client(base: &str, client: reqwest::Client) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Absolute URL of a resource.
    pub fn url(&self, module: &ModuleIdentity, kind: RequestKind) -> Result<Url, FetchError> {
        let rel = module.relative_path(kind)?;
        Url::parse(&format!("{}/{}", self.base, rel))
            .map_err(|e| FetchError::NotFound(format!("invalid upstream url for {module}: {e}")))
    }
}

#[async_trait]
impl Fetcher for UpstreamFetcher {
    fn source(&self) -> Source {
        Source::Upstream
    }

    async fn fetch(
        &self,
        module: &ModuleIdentity,
        kind: RequestKind,
    ) -> Result<ModuleStream, FetchError> {
        let url = self.url(module, kind)?;
        tracing::debug!(url = %url, "Fetching from upstream");

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let content_length = response.content_length();
        if status != StatusCode::OK || content_length == Some(0) {
            return Err(FetchError::NotFound(format!("{url} returned {status}")));
        }

        // Chunked and close-delimited bodies carry no length, so an empty
        // one only shows once the stream ends.
        let mut body = Box::pin(response.bytes_stream());
        let first = loop {
            match body.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
                Some(Err(e)) => return Err(FetchError::Truncated(e.to_string())),
                None => {
                    return Err(FetchError::NotFound(format!("{url} returned an empty body")));
                }
            }
        };

        let rest = body.map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let body = stream::once(async move { Ok(first) }).chain(rest);
        Ok(ModuleStream::from_stream(body, content_length))
    }
}
