//! MCP `capture_message` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CaptureMessageParams {
    #[schemars(description = "Conversation the message belongs to")]
    pub conversation_id: String,

    #[schemars(description = "Speaker: 'user', 'assistant' or 'system'")]
    pub role: String,

    #[schemars(
        description = "Message text. Inline key::value annotations (e.g. project::evna, ctx::refactor) are extracted as metadata."
    )]
    pub content: String,

    /// Binds the server session to this conversation and client.
    #[schemars(
        description = "Front-end capturing the message: 'claude_code' or 'desktop'. When set, later active_context calls are filtered to this client."
    )]
    pub client_type: Option<String>,
}
