use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rbackup_core::config::LocalConfig;
use rbackup_core::{Artifact, RbackupError, Result};

use crate::provider::StorageBackend;

/// Prefix of in-flight upload files. They are never listed.
pub const PARTIAL_PREFIX: &str = ".rbackup-partial-";

/// A local directory used as the "remote" destination.
pub struct LocalBackend {
    base_dir: PathBuf,
    name: String,
}

impl LocalBackend {
    pub fn new(config: &LocalConfig) -> Self {
        Self {
            base_dir: config.path.clone(),
            name: format!("local:{}", config.path.display()),
        }
    }

    fn artifact_path(&self, remote_name: &str) -> PathBuf {
        self.base_dir.join(remote_name)
    }

    fn copy_into_place(&self, local_path: &Path, remote_name: &str) -> std::io::Result<()> {
        let mut src = std::fs::File::open(local_path)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(&self.base_dir)?;
        std::io::copy(&mut src, tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.artifact_path(remote_name))
            .map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn list_files(&self) -> Result<Vec<Artifact>> {
        let unavailable = |e: std::io::Error| {
            RbackupError::BackendUnavailable(format!("{}: {e}", self.base_dir.display()))
        };

        let mut results = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            let Ok(file_name) = entry.file_name().into_string() else {
                tracing::warn!("Skipping non UTF-8 file name in {}", self.base_dir.display());
                continue;
            };
            if file_name.starts_with(PARTIAL_PREFIX) {
                continue;
            }

            // Follows symlinks, so a link to a regular file counts as one.
            let metadata = match std::fs::metadata(entry.path()) {
                Ok(m) => m,
                // Removed between readdir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(unavailable(e)),
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().map_err(unavailable)?;
            results.push(Artifact::new(file_name, DateTime::<Utc>::from(modified)));
        }

        Ok(results)
    }

    async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()> {
        self.copy_into_place(local_path, remote_name)
            .map_err(|e| RbackupError::UploadFailed {
                name: remote_name.to_string(),
                reason: format!("{} -> {}: {e}", local_path.display(), self.base_dir.display()),
            })
    }

    async fn delete(&self, remote_name: &str) -> Result<()> {
        let path = self.artifact_path(remote_name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RbackupError::NotFound(remote_name.to_string()))
            }
            Err(e) => Err(RbackupError::DeleteFailed {
                name: remote_name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn download(&self, remote_name: &str, local_dest: &Path) -> Result<()> {
        let path = self.artifact_path(remote_name);
        if !path.is_file() {
            return Err(RbackupError::NotFound(remote_name.to_string()));
        }
        std::fs::copy(&path, local_dest)
            .map(|_| ())
            .map_err(|e| RbackupError::DownloadFailed {
                name: remote_name.to_string(),
                reason: e.to_string(),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn backend(dir: &Path) -> LocalBackend {
        LocalBackend::new(&LocalConfig {
            path: dir.to_path_buf(),
        })
    }

    #[tokio::test]
    async fn upload_list_download_delete() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let src = local.path().join("db.tar.gz");
        std::fs::write(&src, b"backup bytes").unwrap();

        let backend = backend(remote.path());
        backend.upload(&src, "backup-1.tar.gz").await.unwrap();

        let listed = backend.list_files().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "backup-1.tar.gz");

        let dest = local.path().join("restored");
        backend.download("backup-1.tar.gz", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"backup bytes");

        backend.delete("backup-1.tar.gz").await.unwrap();
        assert!(backend.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_overwrites_existing() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let src = local.path().join("a");
        let backend = backend(remote.path());

        std::fs::write(&src, b"old").unwrap();
        backend.upload(&src, "a").await.unwrap();
        std::fs::write(&src, b"new").unwrap();
        backend.upload(&src, "a").await.unwrap();

        assert_eq!(std::fs::read(remote.path().join("a")).unwrap(), b"new");
        assert_eq!(backend.list_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_leaves_nothing_behind() {
        let remote = TempDir::new().unwrap();
        let backend = backend(remote.path());

        let err = backend
            .upload(Path::new("/nonexistent/src.tar"), "x.tar")
            .await
            .unwrap_err();
        assert!(matches!(err, RbackupError::UploadFailed { .. }));
        assert_eq!(std::fs::read_dir(remote.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn directories_and_partials_are_not_listed() {
        let remote = TempDir::new().unwrap();
        std::fs::create_dir(remote.path().join("nested")).unwrap();
        std::fs::write(remote.path().join("nested").join("inner"), b"x").unwrap();
        std::fs::write(remote.path().join(format!("{PARTIAL_PREFIX}abc")), b"x").unwrap();
        std::fs::write(remote.path().join("kept"), b"x").unwrap();

        let listed = backend(remote.path()).list_files().await.unwrap();
        let names: Vec<_> = listed.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[tokio::test]
    async fn missing_base_dir_is_unavailable() {
        let err = backend(Path::new("/nonexistent/rbackup"))
            .list_files()
            .await
            .unwrap_err();
        assert!(matches!(err, RbackupError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let remote = TempDir::new().unwrap();
        let err = backend(remote.path()).delete("gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn download_missing_is_not_found() {
        let remote = TempDir::new().unwrap();
        let err = backend(remote.path())
            .download("gone", &remote.path().join("out"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
