use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rbackup_core::{Artifact, RbackupError, Result};

use crate::provider::StorageBackend;

struct Entry {
    artifact: Artifact,
    data: Vec<u8>,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
    failing_deletes: HashSet<String>,
}

/// In-memory backend for tests and dry runs. Keeps entries in insertion
/// order.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an artifact with an explicit timestamp and no content.
    pub fn insert(&self, name: &str, last_modified: DateTime<Utc>) {
        self.put(Artifact::new(name, last_modified), Vec::new());
    }

    /// Make every delete of `name` fail with `DeleteFailed`.
    pub fn fail_delete(&self, name: &str) {
        self.lock().failing_deletes.insert(name.to_string());
    }

    /// Names currently stored, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.lock()
            .entries
            .iter()
            .map(|e| e.artifact.name.clone())
            .collect()
    }

    fn put(&self, artifact: Artifact, data: Vec<u8>) {
        let mut state = self.lock();
        match state
            .entries
            .iter_mut()
            .find(|e| e.artifact.name == artifact.name)
        {
            Some(existing) => {
                existing.artifact = artifact;
                existing.data = data;
            }
            None => state.entries.push(Entry { artifact, data }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock can't leave the Vec half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_files(&self) -> Result<Vec<Artifact>> {
        Ok(self
            .lock()
            .entries
            .iter()
            .map(|e| e.artifact.clone())
            .collect())
    }

    async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| RbackupError::UploadFailed {
                name: remote_name.to_string(),
                reason: format!("cannot read {}: {e}", local_path.display()),
            })?;
        self.put(Artifact::new(remote_name, Utc::now()), data);
        Ok(())
    }

    async fn delete(&self, remote_name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.failing_deletes.contains(remote_name) {
            return Err(RbackupError::DeleteFailed {
                name: remote_name.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let before = state.entries.len();
        state.entries.retain(|e| e.artifact.name != remote_name);
        if state.entries.len() == before {
            return Err(RbackupError::NotFound(remote_name.to_string()));
        }
        Ok(())
    }

    async fn download(&self, remote_name: &str, local_dest: &Path) -> Result<()> {
        let data = self
            .lock()
            .entries
            .iter()
            .find(|e| e.artifact.name == remote_name)
            .map(|e| e.data.clone())
            .ok_or_else(|| RbackupError::NotFound(remote_name.to_string()))?;

        tokio::fs::write(local_dest, data)
            .await
            .map_err(|e| RbackupError::DownloadFailed {
                name: remote_name.to_string(),
                reason: e.to_string(),
            })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
