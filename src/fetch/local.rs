//! Local fetcher backed by a private toolchain cache.
//!
//! # Responsibilities
//! - Map identities to files under `<root>/pkg/mod/cache/download`
//! - Materialize missing versions through the toolchain and retry once
//! - Answer list/latest requests from the toolchain's version listing
//!
//! # Design Decisions
//! - Only a clean not-found triggers materialization; other I/O errors surface
//! - Concurrent misses for the same `address@version` share one download

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::fetch::toolchain::{LatestInfo, Toolchain, DOWNLOAD_CACHE_DIR};
use crate::fetch::{FetchError, Fetcher, ModuleStream, Source};
use crate::module::{ModuleIdentity, PathError, RequestKind};
use crate::observability::metrics;

/// Serves module files from the local download cache.
pub struct LocalFetcher {
    cache_dir: PathBuf,
    toolchain: Arc<dyn Toolchain>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl LocalFetcher {
    /// Create a fetcher rooted at `root`, the toolchain's GOPATH.
    pub fn new(root: impl AsRef<Path>, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            cache_dir: root.as_ref().join(DOWNLOAD_CACHE_DIR),
            toolchain,
            in_flight: DashMap::new(),
        }
    }

    /// Absolute cache path of a version file.
    pub fn cache_path(
        &self,
        module: &ModuleIdentity,
        kind: RequestKind,
    ) -> Result<PathBuf, PathError> {
        Ok(self.cache_dir.join(module.relative_path(kind)?))
    }

    /// Number of keys with a download in progress.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    async fn open(path: &Path) -> std::io::Result<ModuleStream> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await.ok().map(|m| m.len());
        Ok(ModuleStream::from_file(file, len))
    }

    async fn version_file(
        &self,
        module: &ModuleIdentity,
        kind: RequestKind,
    ) -> Result<ModuleStream, FetchError> {
        let version = module.version().exact().ok_or(PathError::MissingVersion)?;
        let path = self.cache_path(module, kind)?;

        match Self::open(&path).await {
            Ok(stream) => {
                tracing::debug!(module = %module, kind = %kind, "Cache hit");
                return Ok(stream);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(module = %module, kind = %kind, "Cache miss, materializing");
        self.materialize(module.address(), version, &path).await?;

        Self::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(format!("{module} has no {kind} file after download"))
            } else {
                e.into()
            }
        })
    }

    async fn materialize(
        &self,
        address: &str,
        version: &str,
        path: &Path,
    ) -> Result<(), FetchError> {
        let key = format!("{address}@{version}");
        let lock = self.in_flight.entry(key.clone()).or_default().clone();
        let _cleanup = InFlightEntry {
            map: &self.in_flight,
            key,
        };

        let _held = lock.lock().await;
        // Another request may have finished the download while we waited.
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }

        let result = self.toolchain.download(address, version).await;
        metrics::record_materialize(result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(address, version, error = %e, "Materialization failed");
        }
        result
    }
}

/// Drops the in-flight key once no other task shares it.
struct InFlightEntry<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
}

impl Drop for InFlightEntry<'_> {
    fn drop(&mut self) {
        // The map's own reference plus ours.
        self.map.remove_if(&self.key, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

#[async_trait]
impl Fetcher for LocalFetcher {
    fn source(&self) -> Source {
        Source::Local
    }

    async fn fetch(
        &self,
        module: &ModuleIdentity,
        kind: RequestKind,
    ) -> Result<ModuleStream, FetchError> {
        match kind {
            RequestKind::VersionList => {
                let list = self.toolchain.list_versions(module.address()).await?;
                Ok(ModuleStream::from_bytes(list.render_versions()))
            }
            RequestKind::Latest => {
                let list = self.toolchain.list_versions(module.address()).await?;
                let version = list
                    .latest()
                    .ok_or_else(|| {
                        FetchError::NotFound(format!("{} has no versions", module.address()))
                    })?;
                let body = serde_json::to_vec(&LatestInfo {
                    version: version.to_string(),
                    time: list.time.clone(),
                })?;
                Ok(ModuleStream::from_bytes(body))
            }
            RequestKind::VersionInfo | RequestKind::Manifest | RequestKind::Archive => {
                self.version_file(module, kind).await
            }
            RequestKind::Unknown => Err(PathError::UnknownKind.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::toolchain::VersionList;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Writes fixed files into the cache when asked to download.
    struct ScriptedToolchain {
        root: PathBuf,
        downloads: AtomicUsize,
        fail_with: Option<String>,
    }

    impl ScriptedToolchain {
        fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                downloads: AtomicUsize::new(0),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl Toolchain for ScriptedToolchain {
        async fn list_versions(&self, address: &str) -> Result<VersionList, FetchError> {
            if let Some(msg) = &self.fail_with {
                return Err(FetchError::Command { step: "list", message: msg.clone() });
            }
            Ok(VersionList {
                path: address.to_string(),
                version: "v1.1.0".into(),
                time: Some("2019-05-10T08:00:00Z".into()),
                versions: vec!["v1.0.0".into(), "v1.1.0".into()],
            })
        }

        async fn download(&self, address: &str, version: &str) -> Result<(), FetchError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if let Some(msg) = &self.fail_with {
                return Err(FetchError::Command { step: "download", message: msg.clone() });
            }
            let module = ModuleIdentity::exact(address, version).unwrap();
            let dir = self.root.join(DOWNLOAD_CACHE_DIR);
            for kind in [RequestKind::VersionInfo, RequestKind::Manifest, RequestKind::Archive] {
                let path = dir.join(module.relative_path(kind).unwrap());
                tokio::fs::create_dir_all(path.parent().unwrap()).await?;
                tokio::fs::write(&path, format!("{kind} of {module}")).await?;
            }
            Ok(())
        }
    }

    fn module() -> ModuleIdentity {
        ModuleIdentity::exact("github.com/Org/Project", "v1.0.0").unwrap()
    }

    #[tokio::test]
    async fn test_cache_path_is_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalFetcher::new(dir.path(), Arc::new(ScriptedToolchain::new(dir.path())));
        let path = fetcher.cache_path(&module(), RequestKind::Archive).unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("pkg/mod/cache/download")
                .join("github.com/!org/!project/@v/v1.0.0.zip")
        );
    }

    #[tokio::test]
    async fn test_miss_materializes_then_serves() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Arc::new(ScriptedToolchain::new(dir.path()));
        let fetcher = LocalFetcher::new(dir.path(), toolchain.clone());

        let body = fetcher
            .fetch(&module(), RequestKind::Manifest)
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(&body[..], b"mod of github.com/Org/Project@v1.0.0");

        // Second fetch is a cache hit.
        fetcher.fetch(&module(), RequestKind::Archive).await.unwrap();
        assert_eq!(toolchain.downloads.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_download() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Arc::new(ScriptedToolchain::new(dir.path()));
        let fetcher = Arc::new(LocalFetcher::new(dir.path(), toolchain.clone()));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move {
                    fetcher.fetch(&module(), RequestKind::VersionInfo).await.map(|_| ())
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(toolchain.downloads.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_download_failure_carries_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let mut toolchain = ScriptedToolchain::new(dir.path());
        toolchain.fail_with = Some("unknown revision v1.0.0".into());
        let fetcher = LocalFetcher::new(dir.path(), Arc::new(toolchain));

        let err = fetcher.fetch(&module(), RequestKind::Archive).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown revision v1.0.0");
    }

    #[tokio::test]
    async fn test_list_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalFetcher::new(dir.path(), Arc::new(ScriptedToolchain::new(dir.path())));
        let bare =
            ModuleIdentity::new("example.com/m", crate::module::ModuleVersion::None).unwrap();

        let list = fetcher.fetch(&bare, RequestKind::VersionList).await.unwrap();
        assert_eq!(&list.read_to_end().await.unwrap()[..], b"v1.0.0\nv1.1.0");

        let latest = fetcher.fetch(&bare, RequestKind::Latest).await.unwrap();
        let body = latest.read_to_end().await.unwrap();
        let info: LatestInfo = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.version, "v1.1.0");
        assert_eq!(info.time.as_deref(), Some("2019-05-10T08:00:00Z"));
    }

    #[tokio::test]
    async fn test_version_file_requires_exact_version() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalFetcher::new(dir.path(), Arc::new(ScriptedToolchain::new(dir.path())));
        let latest =
            ModuleIdentity::new("example.com/m", crate::module::ModuleVersion::Latest).unwrap();
        let err = fetcher.fetch(&latest, RequestKind::Archive).await.unwrap_err();
        assert!(matches!(err, FetchError::Path(PathError::MissingVersion)));
    }
}
