use anyhow::Result;

use rbackup_core::retention::order_by_recency;

use super::Remote;

pub async fn run(remote: &Remote<'_>) -> Result<()> {
    let backend = remote.open().await?;
    let artifacts = backend.list_files().await?;

    if artifacts.is_empty() {
        println!("No files found in {}.", backend.name());
        return Ok(());
    }

    let mut ordered: Vec<_> = artifacts.iter().collect();
    order_by_recency(&mut ordered);

    println!("{:<25} NAME", "LAST MODIFIED");
    println!("{}", "-".repeat(80));
    for a in ordered {
        println!(
            "{:<25} {}",
            a.last_modified.format("%Y-%m-%d %H:%M:%S UTC"),
            a.name
        );
    }

    Ok(())
}
