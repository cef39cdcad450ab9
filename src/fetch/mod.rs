//! Fetch subsystem.
//!
//! # Data Flow
//! ```text
//! ModuleIdentity + RequestKind
//!     → upstream.rs: GET <origin>/<escaped path>   (200 + non-empty body)
//!     → local.rs:    open <root>/pkg/mod/cache/download/<escaped path>
//!                    miss → toolchain.rs download → open again
//!     → ModuleStream (chunked bytes, released on drop)
//! ```
//!
//! # Design Decisions
//! - Exactly two sources behind one capability; callers never know which
//! - Streams are never buffered here; buffering is the dispatcher's call
//! - External step diagnostics travel unchanged inside `FetchError`

pub mod error;
pub mod local;
pub mod stream;
pub mod toolchain;
pub mod upstream;

use std::fmt;

use async_trait::async_trait;

use crate::module::{ModuleIdentity, RequestKind};

pub use error::FetchError;
pub use local::LocalFetcher;
pub use stream::ModuleStream;
pub use toolchain::{GoToolchain, LatestInfo, Toolchain, VersionList};
pub use upstream::UpstreamFetcher;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Local,
    Upstream,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Local => "local",
            Source::Upstream => "upstream",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces the byte stream of one protocol resource.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Which source this fetcher reads from.
    fn source(&self) -> Source;

    /// Fetch `kind` for `module`.
    async fn fetch(
        &self,
        module: &ModuleIdentity,
        kind: RequestKind,
    ) -> Result<ModuleStream, FetchError>;
}
