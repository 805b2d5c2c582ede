//! Factory for creating the appropriate StorageBackend based on configuration.

use rbackup_core::config::{EncryptedS3Config, LocalConfig, ResolvedConfig};
use rbackup_core::{BackendKind, Result};

use crate::local::LocalBackend;
use crate::provider::StorageBackend;
use crate::rclone::RcloneCryptBackend;

/// Create a StorageBackend from a kind name and resolved configuration.
///
/// Supported kinds:
/// - `"local"`: a directory on this machine (requires `path`)
/// - `"s3"` / `"object-storage"`: S3-compatible storage (requires endpoint,
///   credentials, bucket and base_dir; compile with the `s3` feature)
/// - `"s3-encrypted"` / `"object-storage-encrypted"`: S3 encrypted through
///   rclone's crypt remote (additionally requires both passwords)
///
/// Configuration is validated before any client is built or process spawned.
pub async fn create_backend(
    kind: &str,
    config: &ResolvedConfig,
) -> Result<Box<dyn StorageBackend>> {
    let kind: BackendKind = kind.parse()?;

    match kind {
        BackendKind::Local => {
            tracing::info!("Creating local filesystem backend");
            let local = LocalConfig::from_resolved(config)?;
            Ok(Box::new(LocalBackend::new(&local)))
        }

        #[cfg(feature = "s3")]
        BackendKind::S3 => {
            tracing::info!("Creating S3 backend");
            let s3 = rbackup_core::config::S3Config::from_resolved(config)?;
            Ok(Box::new(crate::s3::S3Backend::new(&s3).await))
        }

        #[cfg(not(feature = "s3"))]
        BackendKind::S3 => Err(rbackup_core::RbackupError::InvalidConfiguration(
            "s3 feature not enabled. Recompile with --features s3".to_string(),
        )),

        BackendKind::S3Encrypted => {
            tracing::info!("Creating encrypted S3 backend (rclone crypt)");
            let encrypted = EncryptedS3Config::from_resolved(config)?;
            Ok(Box::new(RcloneCryptBackend::new(&encrypted)))
        }
    }
}
