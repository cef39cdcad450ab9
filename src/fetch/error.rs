//! Fetch error taxonomy.

use thiserror::Error;

use crate::module::PathError;

/// Errors that can occur while fetching a module resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The resource does not exist at the source.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream HTTP request failed before a usable response arrived.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// An external toolchain step failed. The message is the step's own
    /// diagnostic output.
    #[error("{message}")]
    Command { step: &'static str, message: String },

    /// An external toolchain step exceeded its deadline.
    #[error("{step} timed out after {secs} seconds")]
    Timeout { step: &'static str, secs: u64 },

    /// The response body ended early or could not be read.
    #[error("truncated response: {0}")]
    Truncated(String),

    /// Toolchain output could not be decoded.
    #[error("invalid toolchain output: {0}")]
    Decode(#[from] serde_json::Error),

    /// Local filesystem failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The module identity cannot be mapped to a resource path.
    #[error(transparent)]
    Path(#[from] PathError),
}

impl FetchError {
    /// Whether the failure means "no such resource" rather than "could not ask".
    pub fn is_not_found(&self) -> bool {
        match self {
            FetchError::NotFound(_) => true,
            FetchError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FetchError::NotFound(_) => "not_found",
            FetchError::Transport(_) => "transport",
            FetchError::Command { .. } => "command",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Truncated(_) => "truncated",
            FetchError::Decode(_) => "decode",
            FetchError::Io(_) => "io",
            FetchError::Path(_) => "path",
        }
    }
}
