use anyhow::Result;
use std::path::Path;

use super::Remote;

pub async fn run(remote: &Remote<'_>, src: &str, dest: &Path) -> Result<()> {
    let backend = remote.open().await?;
    rbackup_storage::download(backend.as_ref(), src, dest).await?;
    println!("Saved {src} to {}", dest.display());
    Ok(())
}
