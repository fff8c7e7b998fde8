use anyhow::{bail, Context, Result};

use evna::config::EvnaConfig;

/// Run the sync watcher in the foreground until ctrl-c.
pub async fn watch(config: &EvnaConfig) -> Result<()> {
    if !config.sync.enabled {
        bail!("sync is disabled; set [sync] enabled = true or EVNA_SYNC_ENABLED=1");
    }

    let mut coalescer = evna::server::write_coalescer(config);
    coalescer.start()?;
    println!(
        "Watching {} for *{} writes (ctrl-c to stop)",
        config.sync.watch_dir, config.sync.extension
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    coalescer.stop();
    Ok(())
}
