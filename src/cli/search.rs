use anyhow::{anyhow, Result};
use std::sync::Arc;

use evna::config::EvnaConfig;
use evna::context::active::ActiveContextStream;
use evna::context::fusion::{format_results, FusionConfig, FusionRetriever, SearchRequest};
use evna::context::types::parse_timestamp;

/// Run a fused search from the terminal.
pub async fn search(
    config: &EvnaConfig,
    query: &str,
    limit: Option<usize>,
    project: Option<String>,
    since: Option<&str>,
    threshold: Option<f64>,
) -> Result<()> {
    let since = since
        .map(parse_timestamp)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let store = Arc::new(evna::server::open_store(config)?);
    let active = Arc::new(ActiveContextStream::new(store.clone()));
    let retriever = FusionRetriever::new(active, store, FusionConfig::from(&config.retrieval));

    let request = SearchRequest {
        query: query.to_string(),
        limit: config.retrieval.clamp_limit(limit),
        project,
        since,
        threshold,
    };
    let results = retriever.search(&request).await?;

    println!("{}", format_results(&results));
    Ok(())
}
