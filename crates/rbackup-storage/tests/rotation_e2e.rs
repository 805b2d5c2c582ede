/// End-to-end rotation over real backends built through the factory.
///
/// The local-directory tests always run. The S3 test needs a reachable
/// S3-compatible endpoint and is skipped unless its env vars are set:
///
///   RBACKUP_TEST_S3_ENDPOINT=http://localhost:9000 \
///   RBACKUP_TEST_S3_ACCESS_KEY_ID=minioadmin \
///   RBACKUP_TEST_S3_SECRET_KEY=minioadmin \
///   RBACKUP_TEST_S3_BUCKET=rbackup-test \
///   cargo test -p rbackup-storage --test rotation_e2e -- --nocapture
use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::{Duration, SystemTime};

use rbackup_core::RetentionPolicy;
use rbackup_core::config::ResolvedConfig;
use rbackup_storage::{create_backend, rotate, upload};
use tempfile::TempDir;

fn write_aged(dir: &Path, name: &str, age_secs: u64) {
    let path = dir.join(name);
    std::fs::write(&path, name.as_bytes()).unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(age_secs);
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_times(FileTimes::new().set_modified(mtime))
        .unwrap();
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[tokio::test]
async fn local_rotation_keeps_newest_matching() {
    let remote = TempDir::new().unwrap();
    write_aged(remote.path(), "db-1.sql", 400);
    write_aged(remote.path(), "db-2.sql", 300);
    write_aged(remote.path(), "db-3.sql", 200);
    write_aged(remote.path(), "log-1.txt", 500);
    std::fs::create_dir(remote.path().join("db-archive")).unwrap();

    let config = ResolvedConfig::new().with("path", remote.path().display().to_string());
    let backend = create_backend("local", &config).await.unwrap();

    let policy = RetentionPolicy::new(1, "^db-").unwrap();
    let report = rotate(backend.as_ref(), &policy, false).await.unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.matched, 3);
    assert!(report.is_clean());

    let remaining: Vec<String> = backend
        .list_files()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(sorted(remaining), vec!["db-3.sql", "log-1.txt"]);
    assert!(remote.path().join("db-archive").is_dir());
}

#[tokio::test]
async fn local_backup_cycle() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    write_aged(remote.path(), "backup-old-1.tar.gz", 3000);
    write_aged(remote.path(), "backup-old-2.tar.gz", 2000);

    let src = local.path().join("site.tar.gz");
    std::fs::write(&src, b"fresh backup").unwrap();

    let config = ResolvedConfig::new().with("path", remote.path().display().to_string());
    let backend = create_backend("local", &config).await.unwrap();
    let policy = RetentionPolicy::new(2, "backup-").unwrap();

    let name = upload(backend.as_ref(), &src, "").await.unwrap();
    assert!(name.starts_with("backup-") && name.ends_with(".tar.gz"));

    let report = rotate(backend.as_ref(), &policy, false).await.unwrap();
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(report.deleted[0].name, "backup-old-1.tar.gz");

    let remaining: Vec<String> = backend
        .list_files()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(sorted(remaining), sorted(vec![name, "backup-old-2.tar.gz".to_string()]));
}

#[cfg(feature = "s3")]
#[tokio::test]
async fn s3_rotation_roundtrip() {
    let Ok(endpoint) = std::env::var("RBACKUP_TEST_S3_ENDPOINT") else {
        eprintln!("SKIP: RBACKUP_TEST_S3_ENDPOINT not set");
        return;
    };
    let var = |name: &str| std::env::var(name).unwrap_or_default();

    let base_dir = format!("rbackup-e2e-{}", std::process::id());
    let config = ResolvedConfig::new()
        .with("endpoint", endpoint)
        .with("access_key_id", var("RBACKUP_TEST_S3_ACCESS_KEY_ID"))
        .with("secret_key", var("RBACKUP_TEST_S3_SECRET_KEY"))
        .with("bucket_name", var("RBACKUP_TEST_S3_BUCKET"))
        .with("base_dir", base_dir)
        .with("retries", "3");
    let backend = create_backend("s3", &config).await.expect("s3 backend");

    let local = TempDir::new().unwrap();
    let src = local.path().join("payload.bin");
    std::fs::write(&src, b"hello from rbackup").unwrap();

    for i in 0..3 {
        upload(backend.as_ref(), &src, &format!("item-{i}.bin"))
            .await
            .expect("upload failed");
        // S3 LastModified has one-second resolution.
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    let policy = RetentionPolicy::new(1, "item-").unwrap();
    let report = rotate(backend.as_ref(), &policy, false).await.expect("rotate");
    assert_eq!(report.deleted.len(), 2);
    assert!(report.is_clean());

    let remaining = backend.list_files().await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "item-2.bin");

    let dest = local.path().join("restored.bin");
    rbackup_storage::download(backend.as_ref(), "item-2.bin", &dest)
        .await
        .expect("download");
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello from rbackup");

    assert!(backend.delete("item-0.bin").await.unwrap_err().is_not_found());
    backend.delete("item-2.bin").await.expect("cleanup");
}
