use anyhow::Result;
use chrono::{Duration, Utc};

use evna::config::EvnaConfig;

/// Archive expired active context.
pub async fn archive(config: &EvnaConfig, older_than_hours: Option<i64>) -> Result<()> {
    let store = evna::server::open_store(config)?;

    let moved = match older_than_hours {
        Some(hours) => store.archive_expired(Utc::now() - Duration::hours(hours)).await?,
        None => evna::server::archive_expired(&store, config).await?,
    };

    if moved == 0 {
        println!("No expired active context.");
    } else {
        println!("Archived {moved} message(s).");
    }
    Ok(())
}
