//! MCP `active_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ActiveContextParams {
    #[schemars(description = "Maximum number of messages to return. Defaults to the configured limit; capped at the configured maximum.")]
    pub limit: Option<usize>,

    #[schemars(description = "Filter by project name or one of its aliases")]
    pub project: Option<String>,

    /// First message of a turn sees every client's messages.
    #[schemars(
        description = "True on the first message of a turn: returns context from all clients. Otherwise context is limited to the bound client. Defaults to true."
    )]
    pub is_first_message: Option<bool>,
}
