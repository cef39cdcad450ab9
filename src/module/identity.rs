//! Module identity and per-kind relative paths.

use std::fmt;

use crate::module::escape::{encode, is_encodable};
use crate::module::path::{PathError, RequestKind};

/// Separator placed between an address and a version-scoped file.
pub const VERSION_SEPARATOR: &str = "@v";

/// Literal used for the latest-version endpoint and its pending version.
pub const LATEST: &str = "latest";

/// File listing every known version.
pub const LIST_FILE: &str = "list";

/// Version component of a module identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModuleVersion {
    /// No version; only valid for version-list requests.
    #[default]
    None,
    /// Pending "latest" resolution. Never used to look up version files.
    Latest,
    /// A concrete version tag such as `v1.2.3`.
    Exact(String),
}

impl ModuleVersion {
    /// Wire representation: empty, `latest`, or the tag.
    pub fn as_str(&self) -> &str {
        match self {
            ModuleVersion::None => "",
            ModuleVersion::Latest => LATEST,
            ModuleVersion::Exact(v) => v,
        }
    }

    /// The concrete tag, if resolved.
    pub fn exact(&self) -> Option<&str> {
        match self {
            ModuleVersion::Exact(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A module address (always decoded) plus an optional version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdentity {
    address: String,
    version: ModuleVersion,
}

impl ModuleIdentity {
    /// Create an identity from a decoded address.
    ///
    /// Leading and trailing slashes are trimmed. Addresses that cannot be
    /// escaped (escape marker, non-printable or non-ASCII characters) are
    /// rejected here so that path building never meets them, as are empty,
    /// `.` and `..` elements and versions that are not a single file name.
    pub fn new(address: &str, version: ModuleVersion) -> Result<Self, PathError> {
        let address = address.trim_matches('/');
        if address.is_empty() {
            return Err(PathError::MissingAddress);
        }
        if let Some(c) = address.chars().find(|c| !is_encodable(*c)) {
            return Err(PathError::InvalidCharacter {
                address: address.to_string(),
                character: c,
            });
        }
        if let Some(segment) = address.split('/').find(|s| matches!(*s, "" | "." | "..")) {
            return Err(PathError::InvalidSegment {
                address: address.to_string(),
                segment: segment.to_string(),
            });
        }
        if let ModuleVersion::Exact(v) = &version {
            validate_version(v)?;
        }
        Ok(Self {
            address: address.to_string(),
            version,
        })
    }

    /// Shorthand for an identity with a concrete version.
    pub fn exact(address: &str, version: impl Into<String>) -> Result<Self, PathError> {
        let version = version.into();
        if version.is_empty() {
            return Err(PathError::MissingVersion);
        }
        Self::new(address, ModuleVersion::Exact(version))
    }

    /// The decoded address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn version(&self) -> &ModuleVersion {
        &self.version
    }

    /// Replace a pending `latest` with the resolved version.
    pub fn resolve(mut self, version: impl Into<String>) -> Result<Self, PathError> {
        let version = version.into();
        validate_version(&version)?;
        self.version = ModuleVersion::Exact(version);
        Ok(self)
    }

    /// `address@version`, as accepted by the toolchain.
    pub fn address_with_version(&self) -> String {
        format!("{}@{}", self.address, self.version)
    }

    /// Host part of the address with any port stripped.
    pub fn domain(&self) -> &str {
        let host = self.address.split('/').next().unwrap_or(&self.address);
        match host.rsplit_once(':') {
            Some((name, port)) if !name.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                name
            }
            _ => host,
        }
    }

    /// Path of the resource for `kind`, relative to a protocol root.
    ///
    /// Only the address is escaped; the version is emitted as-is.
    pub fn relative_path(&self, kind: RequestKind) -> Result<String, PathError> {
        let address = encode(&self.address)?;
        let path = match kind {
            RequestKind::VersionList => format!("{address}/{VERSION_SEPARATOR}/{LIST_FILE}"),
            RequestKind::Latest => format!("{address}/@{LATEST}"),
            RequestKind::VersionInfo | RequestKind::Manifest | RequestKind::Archive => {
                let version = self.version.exact().ok_or(PathError::MissingVersion)?;
                format!(
                    "{address}/{VERSION_SEPARATOR}/{version}{}",
                    kind.extension().unwrap_or_default()
                )
            }
            RequestKind::Unknown => return Err(PathError::UnknownKind),
        };
        Ok(path)
    }

    pub fn list_path(&self) -> Result<String, PathError> {
        self.relative_path(RequestKind::VersionList)
    }

    pub fn latest_path(&self) -> Result<String, PathError> {
        self.relative_path(RequestKind::Latest)
    }

    pub fn info_path(&self) -> Result<String, PathError> {
        self.relative_path(RequestKind::VersionInfo)
    }

    pub fn manifest_path(&self) -> Result<String, PathError> {
        self.relative_path(RequestKind::Manifest)
    }

    pub fn archive_path(&self) -> Result<String, PathError> {
        self.relative_path(RequestKind::Archive)
    }
}

/// A concrete version must be usable as one path element.
fn validate_version(version: &str) -> Result<(), PathError> {
    if version.is_empty() {
        return Err(PathError::MissingVersion);
    }
    let not_one_element = matches!(version, "." | "..") || version.contains(['/', '\\']);
    if not_one_element || !version.chars().all(is_encodable) {
        return Err(PathError::InvalidVersion(version.to_string()));
    }
    Ok(())
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            ModuleVersion::None => f.write_str(&self.address),
            _ => write!(f, "{}@{}", self.address, self.version),
        }
    }
}
