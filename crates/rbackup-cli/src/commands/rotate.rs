use anyhow::Result;

use rbackup_core::RetentionPolicy;
use rbackup_storage::{RotationReport, StorageBackend};

use super::Remote;
use crate::RetentionArgs;

pub async fn run(remote: &Remote<'_>, retention: &RetentionArgs, dry_run: bool) -> Result<()> {
    let policy = retention.policy()?;
    let backend = remote.open().await?;
    rotate_with(backend.as_ref(), &policy, dry_run).await
}

/// Rotate and turn a report with failed deletes into an error.
pub async fn rotate_with(
    backend: &dyn StorageBackend,
    policy: &RetentionPolicy,
    dry_run: bool,
) -> Result<()> {
    let report = rbackup_storage::rotate(backend, policy, dry_run).await?;
    print_report(&report);

    if !report.is_clean() {
        anyhow::bail!(
            "Rotation finished with {} failed deletes",
            report.failures.len()
        );
    }
    Ok(())
}

fn print_report(report: &RotationReport) {
    let verb = if report.dry_run { "Would delete" } else { "Deleted" };
    for artifact in &report.deleted {
        println!("{verb}: {artifact}");
    }
    for name in &report.already_gone {
        println!("Already gone: {name}");
    }
    for (name, err) in &report.failures {
        eprintln!("WARN: Failed to delete {name}: {err}");
    }

    println!(
        "\nRotation completed: {} of {} managed files {}, {} errors",
        report.deleted.len(),
        report.matched,
        if report.dry_run { "selected" } else { "deleted" },
        report.failures.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rbackup_storage::memory::MemoryBackend;

    #[tokio::test]
    async fn clean_rotation_succeeds() {
        let backend = MemoryBackend::new();
        backend.insert("db-1", Utc.timestamp_opt(1, 0).unwrap());
        backend.insert("db-2", Utc.timestamp_opt(2, 0).unwrap());

        let policy = RetentionPolicy::new(1, "db-").unwrap();
        rotate_with(&backend, &policy, false).await.unwrap();
        assert_eq!(backend.names(), vec!["db-2"]);
    }

    #[tokio::test]
    async fn failed_deletes_fail_the_command() {
        let backend = MemoryBackend::new();
        backend.insert("db-1", Utc.timestamp_opt(1, 0).unwrap());
        backend.insert("db-2", Utc.timestamp_opt(2, 0).unwrap());
        backend.fail_delete("db-1");

        let policy = RetentionPolicy::new(0, "").unwrap();
        let err = rotate_with(&backend, &policy, false).await.unwrap_err();
        assert!(err.to_string().contains("1 failed deletes"));
        assert_eq!(backend.names(), vec!["db-1"]);
    }
}
