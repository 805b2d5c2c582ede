use anyhow::Result;
use std::path::Path;

use super::Remote;

pub async fn run(remote: &Remote<'_>, src: &Path, dest: &str) -> Result<()> {
    let backend = remote.open().await?;
    let name = rbackup_storage::upload(backend.as_ref(), src, dest).await?;
    println!("Uploaded {} as {name}", src.display());
    Ok(())
}
