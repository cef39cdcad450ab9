//! Request path grammar.
//!
//! ```text
//! /<escaped-address>/@v/list            VersionList
//! /<escaped-address>/@latest            Latest
//! /<escaped-address>/@v/@latest         Latest
//! /<escaped-address>/@v/<version>.info  VersionInfo
//! /<escaped-address>/@v/<version>.mod   Manifest
//! /<escaped-address>/@v/<version>.zip   Archive
//! ```

use std::fmt;

use thiserror::Error;

use crate::module::escape::{decode, EscapeError};
use crate::module::identity::{ModuleIdentity, ModuleVersion};

const VERSION_MARKER: &str = "/@v/";
const VERSION_DIR: &str = "/@v";
const LATEST_MARKER: &str = "/@latest";
const LIST_SUFFIX: &str = "/@v/list";
const LATEST_SUFFIX: &str = "@latest";

/// Errors raised while parsing a request path or building a module path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("unknown path type")]
    UnknownKind,

    #[error("invalid path")]
    InvalidPath,

    #[error("missing module address")]
    MissingAddress,

    #[error("unknown version")]
    MissingVersion,

    #[error("invalid character {character:?} in module address {address:?}")]
    InvalidCharacter { address: String, character: char },

    #[error("invalid path element {segment:?} in module address {address:?}")]
    InvalidSegment { address: String, segment: String },

    #[error("invalid version {0:?}")]
    InvalidVersion(String),

    #[error(transparent)]
    Escape(#[from] EscapeError),
}

/// The protocol resource a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    VersionList,
    Latest,
    VersionInfo,
    Manifest,
    Archive,
    Unknown,
}

impl RequestKind {
    /// File extension of version-scoped kinds, including the dot.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            RequestKind::VersionInfo => Some(".info"),
            RequestKind::Manifest => Some(".mod"),
            RequestKind::Archive => Some(".zip"),
            _ => None,
        }
    }

    /// Whether the resource is named by an exact version.
    pub fn needs_version(self) -> bool {
        self.extension().is_some()
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::VersionList => "list",
            RequestKind::Latest => "latest",
            RequestKind::VersionInfo => "info",
            RequestKind::Manifest => "mod",
            RequestKind::Archive => "zip",
            RequestKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension of the final path element, like `path.extname`.
fn extension(path: &str) -> &str {
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rfind('.') {
        Some(i) => &last[i..],
        None => "",
    }
}

/// Determine the request kind of a slash-trimmed path.
pub fn classify(path: &str) -> RequestKind {
    match extension(path) {
        ".info" => RequestKind::VersionInfo,
        ".mod" => RequestKind::Manifest,
        ".zip" => RequestKind::Archive,
        _ if path.ends_with(LIST_SUFFIX) => RequestKind::VersionList,
        _ if path.ends_with(LATEST_SUFFIX) => RequestKind::Latest,
        _ => RequestKind::Unknown,
    }
}

/// A classified request path. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    module: ModuleIdentity,
    kind: RequestKind,
}

impl ParsedRequest {
    /// Parse a raw request path such as `/github.com/!org/repo/@v/v1.0.0.zip`.
    ///
    /// Unknown kinds fail with [`PathError::UnknownKind`]; the address is
    /// unescaped before it is stored.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let path = raw.trim_matches('/');
        let kind = classify(path);
        if kind == RequestKind::Unknown {
            return Err(PathError::UnknownKind);
        }

        let escaped_address = match path.find(VERSION_MARKER).or_else(|| path.find(LATEST_MARKER)) {
            Some(0) | None => return Err(PathError::InvalidPath),
            Some(i) => &path[..i],
        };

        let version = match kind {
            RequestKind::VersionList => ModuleVersion::None,
            RequestKind::Latest => ModuleVersion::Latest,
            _ => {
                // The version file is the final element, directly under
                // `<address>/@v/`.
                let (dir, file) = path.rsplit_once('/').ok_or(PathError::InvalidPath)?;
                if dir.strip_suffix(VERSION_DIR) != Some(escaped_address) {
                    return Err(PathError::InvalidPath);
                }
                let ext_len = kind.extension().map(str::len).unwrap_or_default();
                let version = &file[..file.len() - ext_len];
                if version.is_empty() {
                    return Err(PathError::MissingVersion);
                }
                ModuleVersion::Exact(version.to_string())
            }
        };

        let address = decode(escaped_address)?;
        let module = ModuleIdentity::new(&address, version)?;
        Ok(Self { module, kind })
    }

    /// Build a request directly from its parts.
    pub fn new(module: ModuleIdentity, kind: RequestKind) -> Result<Self, PathError> {
        if kind == RequestKind::Unknown {
            return Err(PathError::UnknownKind);
        }
        if kind.needs_version() && module.version().exact().is_none() {
            return Err(PathError::MissingVersion);
        }
        Ok(Self { module, kind })
    }

    pub fn module(&self) -> &ModuleIdentity {
        &self.module
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}
