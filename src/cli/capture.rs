use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;

use evna::config::EvnaConfig;
use evna::context::active::ActiveContextStream;
use evna::context::types::{ClientType, Role};

/// Capture one message from the terminal and print what was stored.
pub async fn capture(
    config: &EvnaConfig,
    conversation: &str,
    role: &str,
    client: Option<&str>,
    content: &str,
) -> Result<()> {
    let role: Role = role.parse().map_err(|e: String| anyhow!(e))?;
    let client = client
        .map(str::parse::<ClientType>)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let store = Arc::new(evna::server::open_store(config)?);
    let stream = ActiveContextStream::new(store);
    let message = stream
        .capture_message(conversation, role, content, Utc::now(), client)
        .await?;

    println!("Captured {}", message.id);
    if message.markers.is_empty() {
        println!("  (no annotations)");
    }
    for marker in &message.markers {
        println!("  {}::{}", marker.key, marker.value);
    }
    Ok(())
}
