use async_trait::async_trait;
use std::path::Path;

use rbackup_core::{Artifact, Result};

/// Trait for remote/local artifact stores.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List every file/object under the backend's scope. Never returns
    /// directories.
    async fn list_files(&self) -> Result<Vec<Artifact>>;

    /// Copy a local file to `remote_name`, replacing any existing artifact.
    async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()>;

    /// Remove one artifact. Reports `NotFound` if it is already gone.
    async fn delete(&self, remote_name: &str) -> Result<()>;

    /// Fetch an artifact to a local path.
    async fn download(&self, remote_name: &str, local_dest: &Path) -> Result<()>;

    /// Backend name for display.
    fn name(&self) -> &str;
}
