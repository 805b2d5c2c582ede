//! Upload and download of single artifacts.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::path::Path;

use rbackup_core::Result;
use rbackup_core::naming::destination_name;

use crate::provider::StorageBackend;

/// Upload `src` to the backend and return the remote name used.
///
/// A blank `dest` is replaced by a timestamped name built from the current
/// local time.
pub async fn upload(backend: &dyn StorageBackend, src: &Path, dest: &str) -> Result<String> {
    upload_at(backend, src, dest, &Local::now()).await
}

/// [`upload`] with an explicit clock.
pub async fn upload_at<Tz>(
    backend: &dyn StorageBackend,
    src: &Path,
    dest: &str,
    now: &DateTime<Tz>,
) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let dest = match dest.trim() {
        "" => destination_name(src, now),
        explicit => explicit.to_string(),
    };

    tracing::info!("Uploading '{}' to '{dest}'", src.display());
    backend.upload(src, &dest).await?;
    tracing::info!("Done");
    Ok(dest)
}

/// Fetch a remote artifact into a local path.
pub async fn download(backend: &dyn StorageBackend, src: &str, dest: &Path) -> Result<()> {
    tracing::info!("Downloading '{src}' and saving to '{}'", dest.display());
    backend.download(src, dest).await?;
    tracing::info!("Done");
    Ok(())
}
