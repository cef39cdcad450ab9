//! External toolchain steps used by the local fetcher.
//!
//! # Responsibilities
//! - List the known versions of a module
//! - Materialize a module version into the download cache
//!
//! # Design Decisions
//! - The steps run the Go toolchain as a child process against a private
//!   GOPATH, so its download cache doubles as our storage
//! - Children are killed if the awaiting request is dropped
//! - Diagnostics are the child's stderr, passed through verbatim

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::config::StorageConfig;
use crate::fetch::FetchError;

/// Cache layout below the toolchain root.
pub const DOWNLOAD_CACHE_DIR: &str = "pkg/mod/cache/download";

/// Output of the version-listing step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionList {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
}

impl VersionList {
    /// Versions rendered one per line.
    pub fn render_versions(&self) -> String {
        self.versions.join("\n")
    }

    /// The resolved latest version, falling back to the last listed one.
    pub fn latest(&self) -> Option<&str> {
        if !self.version.is_empty() {
            return Some(&self.version);
        }
        self.versions.last().map(String::as_str)
    }
}

/// Body of a latest-version response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LatestInfo {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// The two external steps the local fetcher depends on.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// List known versions of `address` (decoded form).
    async fn list_versions(&self, address: &str) -> Result<VersionList, FetchError>;

    /// Ensure `address@version` is present in the download cache.
    ///
    /// Must be idempotent and safe to call on a partially populated cache.
    async fn download(&self, address: &str, version: &str) -> Result<(), FetchError>;
}

/// Runs the Go toolchain binary.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: String,
    root: PathBuf,
    env: BTreeMap<String, String>,
    timeout: Duration,
}

impl GoToolchain {
    pub fn new(config: &StorageConfig) -> Self {
        let mut env = BTreeMap::new();
        env.insert("GOPATH".to_string(), config.cache_root.display().to_string());
        env.insert("GOPROXY".to_string(), "direct".to_string());
        env.insert(
            "GOCACHE".to_string(),
            config.cache_root.join("cache").display().to_string(),
        );
        env.insert("GO111MODULE".to_string(), "on".to_string());
        for (key, value) in &config.env {
            env.insert(key.clone(), value.clone());
        }

        Self {
            binary: config.go_binary.clone(),
            root: config.cache_root.clone(),
            env,
            timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    async fn run(&self, step: &'static str, args: &[&str]) -> Result<Vec<u8>, FetchError> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .envs(&self.env)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(step, binary = %self.binary, ?args, "Running toolchain step");

        let child = command.spawn().map_err(|e| FetchError::Command {
            step,
            message: format!("failed to run {}: {}", self.binary, e),
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    step,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !output.status.success() {
            let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if message.is_empty() {
                format!("{} exited with {}", step, output.status)
            } else {
                message
            };
            return Err(FetchError::Command { step, message });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    async fn list_versions(&self, address: &str) -> Result<VersionList, FetchError> {
        let stdout = self
            .run("list", &["list", "-m", "-versions", "-json", address])
            .await?;
        Ok(serde_json::from_slice(&stdout)?)
    }

    async fn download(&self, address: &str, version: &str) -> Result<(), FetchError> {
        let target = format!("{address}@{version}");
        self.run("download", &["mod", "download", &target]).await?;
        Ok(())
    }
}
