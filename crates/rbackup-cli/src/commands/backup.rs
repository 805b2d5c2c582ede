use anyhow::Result;
use std::path::Path;

use super::Remote;
use super::rotate::rotate_with;
use crate::RetentionArgs;

/// Rotate first to make room, upload, then rotate again so the new file
/// counts against the limit.
pub async fn run(
    remote: &Remote<'_>,
    src: &Path,
    dest: &str,
    retention: &RetentionArgs,
) -> Result<()> {
    let policy = retention.policy()?;
    let backend = remote.open().await?;

    // A failed prune must not block taking the new backup.
    let before = rotate_with(backend.as_ref(), &policy, false).await;
    if let Err(ref e) = before {
        tracing::warn!("{e}");
    }

    let name = rbackup_storage::upload(backend.as_ref(), src, dest).await?;
    println!("Uploaded {} as {name}", src.display());

    rotate_with(backend.as_ref(), &policy, false).await?;
    before
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn keeps_only_newest_after_upload() {
        let remote_dir = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let src = local.path().join("db.sql.gz");
        std::fs::write(&src, b"dump").unwrap();
        std::fs::write(remote_dir.path().join("unmanaged.txt"), b"x").unwrap();

        let connection = format!(
            r#"{{"path": "{}"}}"#,
            remote_dir.path().display().to_string().replace('\\', "\\\\")
        );
        let remote = Remote {
            kind: "local",
            connection: &connection,
        };
        let retention = RetentionArgs {
            max_versions: 1,
            pattern: "db-".to_string(),
        };

        run(&remote, &src, "db-1.sql.gz", &retention).await.unwrap();
        run(&remote, &src, "db-2.sql.gz", &retention).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(remote_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["db-2.sql.gz", "unmanaged.txt"]);
    }
}
