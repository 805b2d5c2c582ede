pub mod backup;
pub mod download;
pub mod list;
pub mod rotate;
pub mod upload;

use anyhow::{Context, Result};

use rbackup_core::config::ResolvedConfig;
use rbackup_core::{BackendKind, RetentionPolicy};
use rbackup_storage::StorageBackend;

use crate::RetentionArgs;

/// Backend selection from the global CLI flags.
pub struct Remote<'a> {
    pub kind: &'a str,
    pub connection: &'a str,
}

impl Remote<'_> {
    /// Resolve configuration and build the backend once per command.
    pub async fn open(&self) -> Result<Box<dyn StorageBackend>> {
        let kind: BackendKind = self.kind.parse()?;
        let config = ResolvedConfig::from_remote(kind, self.connection)
            .context("Failed to resolve remote configuration")?;
        let backend = rbackup_storage::create_backend(kind.as_str(), &config)
            .await
            .with_context(|| format!("Failed to create {kind} backend"))?;
        Ok(backend)
    }
}

impl RetentionArgs {
    pub fn policy(&self) -> Result<RetentionPolicy> {
        Ok(RetentionPolicy::new(self.max_versions, &self.pattern)?)
    }
}
