use anyhow::{anyhow, Result};
use std::sync::Arc;

use evna::config::EvnaConfig;
use evna::context::active::{format_context, ActiveContextStream};
use evna::context::types::ClientType;

/// Print recent active context as markdown.
pub async fn context(
    config: &EvnaConfig,
    limit: Option<usize>,
    project: Option<&str>,
    client: Option<&str>,
) -> Result<()> {
    let client = client
        .map(str::parse::<ClientType>)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let store = Arc::new(evna::server::open_store(config)?);
    let stream = ActiveContextStream::new(store);
    let messages = stream
        .query_context(
            config.retrieval.clamp_limit(limit),
            project,
            client,
            None,
        )
        .await?;

    println!("{}", format_context(&messages));
    Ok(())
}
