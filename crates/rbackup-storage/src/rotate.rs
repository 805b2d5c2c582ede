//! Rotation: keep only the newest versions in the remote store.

use rbackup_core::{Artifact, RbackupError, Result, RetentionPolicy};

use crate::provider::StorageBackend;

/// Outcome of a rotation run.
#[derive(Debug, Default)]
pub struct RotationReport {
    /// Artifacts listed in the backend overall.
    pub total: usize,
    /// Artifacts matching the policy's pattern.
    pub matched: usize,
    /// Artifacts deleted, or selected for deletion on a dry run.
    pub deleted: Vec<Artifact>,
    /// Selected artifacts that were already gone at delete time.
    pub already_gone: Vec<String>,
    /// Deletes that failed for any other reason.
    pub failures: Vec<(String, RbackupError)>,
    pub dry_run: bool,
}

impl RotationReport {
    /// No delete failed. Already-gone artifacts don't count as failures.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete every artifact the policy doesn't keep.
///
/// A failed list aborts the rotation. Delete failures don't: each delete is
/// independent, so the remaining ones still run and every failure ends up in
/// the report.
pub async fn rotate(
    backend: &dyn StorageBackend,
    policy: &RetentionPolicy,
    dry_run: bool,
) -> Result<RotationReport> {
    tracing::info!("Listing files in {}...", backend.name());
    let listing = backend.list_files().await?;

    let mut report = RotationReport {
        total: listing.len(),
        matched: policy.matching(&listing).len(),
        dry_run,
        ..Default::default()
    };
    tracing::info!(
        "There are {} files in remote filesystem overall, {} managed by the pattern",
        report.total,
        report.matched
    );

    let selected = policy.select_for_deletion(&listing);
    if selected.is_empty() {
        tracing::info!("Nothing to rotate (keeping up to {})", policy.keep_count);
        return Ok(report);
    }
    tracing::info!(
        "There are more than {} files, {} to delete",
        policy.keep_count,
        selected.len()
    );

    for artifact in selected {
        if dry_run {
            tracing::info!("Would delete '{}' ({})", artifact.name, artifact.last_modified);
            report.deleted.push(artifact);
            continue;
        }

        tracing::info!("Deleting '{}' ({})", artifact.name, artifact.last_modified);
        match backend.delete(&artifact.name).await {
            Ok(()) => report.deleted.push(artifact),
            Err(e) if e.is_not_found() => {
                tracing::warn!("'{}' was already gone", artifact.name);
                report.already_gone.push(artifact.name);
            }
            Err(e) => {
                tracing::warn!("Failed to delete '{}': {e}", artifact.name);
                report.failures.push((artifact.name, e));
            }
        }
    }

    tracing::info!(
        "Rotation done: {} deleted, {} already gone, {} failed",
        report.deleted.len(),
        report.already_gone.len(),
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::Path;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Lists artifacts that no longer exist, like a concurrent rotation
    /// would leave behind.
    struct StaleListing(Vec<Artifact>);

    #[async_trait]
    impl StorageBackend for StaleListing {
        async fn list_files(&self) -> Result<Vec<Artifact>> {
            Ok(self.0.clone())
        }
        async fn upload(&self, _: &Path, _: &str) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, name: &str) -> Result<()> {
            Err(RbackupError::NotFound(name.to_string()))
        }
        async fn download(&self, name: &str, _: &Path) -> Result<()> {
            Err(RbackupError::NotFound(name.to_string()))
        }
        fn name(&self) -> &str {
            "stale"
        }
    }

    struct Offline;

    #[async_trait]
    impl StorageBackend for Offline {
        async fn list_files(&self) -> Result<Vec<Artifact>> {
            Err(RbackupError::BackendUnavailable("connection refused".into()))
        }
        async fn upload(&self, _: &Path, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn delete(&self, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn download(&self, _: &str, _: &Path) -> Result<()> {
            unreachable!()
        }
        fn name(&self) -> &str {
            "offline"
        }
    }

    #[tokio::test]
    async fn deletes_oldest_beyond_keep_count() {
        let backend = MemoryBackend::new();
        backend.insert("yeah-1", at(1));
        backend.insert("yeah-2", at(2));
        backend.insert("yeah-3", at(3));

        let policy = RetentionPolicy::new(2, "").unwrap();
        let report = rotate(&backend, &policy, false).await.unwrap();

        assert_eq!(backend.names(), vec!["yeah-2", "yeah-3"]);
        assert_eq!(report.total, 3);
        assert_eq!(report.matched, 3);
        assert_eq!(report.deleted.len(), 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn second_run_deletes_nothing() {
        let backend = MemoryBackend::new();
        for i in 0..5 {
            backend.insert(&format!("db-{i}"), at(i));
        }
        let policy = RetentionPolicy::new(2, "db-").unwrap();

        let first = rotate(&backend, &policy, false).await.unwrap();
        assert_eq!(first.deleted.len(), 3);

        let second = rotate(&backend, &policy, false).await.unwrap();
        assert!(second.deleted.is_empty());
        assert_eq!(backend.names(), vec!["db-3", "db-4"]);
    }

    #[tokio::test]
    async fn dry_run_deletes_nothing() {
        let backend = MemoryBackend::new();
        backend.insert("a", at(1));
        backend.insert("b", at(2));

        let policy = RetentionPolicy::new(0, "").unwrap();
        let report = rotate(&backend, &policy, true).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(backend.names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn not_found_is_benign() {
        let backend = StaleListing(vec![Artifact::new("ghost", at(1))]);
        let policy = RetentionPolicy::new(0, "").unwrap();

        let report = rotate(&backend, &policy, false).await.unwrap();
        assert_eq!(report.already_gone, vec!["ghost"]);
        assert!(report.deleted.is_empty());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn failures_do_not_stop_remaining_deletes() {
        let backend = MemoryBackend::new();
        backend.insert("a", at(1));
        backend.insert("b", at(2));
        backend.insert("c", at(3));
        backend.fail_delete("b");

        let policy = RetentionPolicy::new(0, "").unwrap();
        let report = rotate(&backend, &policy, false).await.unwrap();

        assert_eq!(backend.names(), vec!["b"]);
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "b");
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn list_failure_is_fatal() {
        let policy = RetentionPolicy::new(1, "").unwrap();
        let err = rotate(&Offline, &policy, false).await.unwrap_err();
        assert!(matches!(err, RbackupError::BackendUnavailable(_)));
    }
}
