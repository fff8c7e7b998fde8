//! MCP server initialization over stdio.
//!
//! [`serve_stdio`] opens the database, runs one archival pass over expired
//! active context, starts the sync watcher when enabled, and serves
//! [`EvnaTools`] until the client disconnects.

use anyhow::Result;
use chrono::{Duration, Utc};
use rmcp::ServiceExt;
use std::sync::{Arc, Mutex};

use crate::config::EvnaConfig;
use crate::db;
use crate::store::{ProjectAliases, SqliteStore};
use crate::sync::coalescer::{CoalescerConfig, WriteCoalescer};
use crate::sync::CommandSyncTrigger;
use crate::tools::EvnaTools;

/// Open the configured database and wrap it in a [`SqliteStore`].
pub fn open_store(config: &EvnaConfig) -> Result<SqliteStore> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let aliases = ProjectAliases::new(config.projects.aliases.clone());
    Ok(SqliteStore::new(Arc::new(Mutex::new(conn)), aliases))
}

/// Move active messages older than `storage.active_ttl_hours` into the archive.
pub async fn archive_expired(store: &SqliteStore, config: &EvnaConfig) -> Result<usize> {
    let cutoff = Utc::now() - Duration::hours(config.storage.active_ttl_hours);
    let moved = store.archive_expired(cutoff).await?;
    tracing::debug!(ttl_hours = config.storage.active_ttl_hours, "archival pass complete");
    Ok(moved)
}

/// Build the sync watcher described by `[sync]`.
pub fn write_coalescer(config: &EvnaConfig) -> WriteCoalescer {
    let trigger = Arc::new(CommandSyncTrigger::from_config(&config.sync));
    WriteCoalescer::new(CoalescerConfig::from(&config.sync), trigger)
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: EvnaConfig) -> Result<()> {
    tracing::info!("starting evna MCP server on stdio");

    let store = Arc::new(open_store(&config)?);
    if let Err(e) = archive_expired(&store, &config).await {
        tracing::warn!(error = %e, "archival pass failed; continuing");
    }

    let mut coalescer = write_coalescer(&config);
    if let Err(e) = coalescer.start() {
        tracing::warn!(error = %e, "sync watcher not started");
    }

    let config = Arc::new(config);
    let tools = EvnaTools::new(store.clone(), store, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    coalescer.stop();
    tracing::info!("MCP server shut down");

    Ok(())
}
