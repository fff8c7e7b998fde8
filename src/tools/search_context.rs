//! MCP `search_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchContextParams {
    #[schemars(description = "Natural language or keyword query")]
    pub query: String,

    #[schemars(description = "Maximum number of results to return. Defaults to the configured limit; capped at the configured maximum.")]
    pub limit: Option<usize>,

    #[schemars(description = "Filter by project name or one of its aliases")]
    pub project: Option<String>,

    #[schemars(
        description = "Only consider messages at or after this RFC 3339 timestamp. Defaults to 7 days ago."
    )]
    pub since: Option<String>,

    #[schemars(description = "Minimum historical similarity (0.0-1.0). Defaults to 0.0.")]
    pub threshold: Option<f64>,
}
