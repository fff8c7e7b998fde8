//! The recency tier: capture messages and read them back newest first.

use chrono::{DateTime, Utc};
use std::fmt::Write;
use std::sync::Arc;

use crate::context::annotations::{self, first_value};
use crate::context::types::{ClientType, Message, Role};
use crate::error::{ContextError, ContextResult};
use crate::store::{ActiveQuery, DataStore};

/// Rendered in place of an empty context block.
pub const NO_ACTIVE_CONTEXT: &str = "**No active context available**";

/// Capture and query front for the active tier.
#[derive(Clone)]
pub struct ActiveContextStream {
    store: Arc<dyn DataStore>,
}

impl ActiveContextStream {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Parse annotations out of `content`, build a message and write it.
    ///
    /// `project` and `meeting` come from the first `project::` and
    /// `meeting::` annotations. A store failure is returned as
    /// [`ContextError::CaptureFailed`]; nothing is retried.
    pub async fn capture_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        timestamp: DateTime<Utc>,
        client_type: Option<ClientType>,
    ) -> ContextResult<Message> {
        let markers = annotations::parse(content);
        let message = Message {
            id: uuid::Uuid::now_v7().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            timestamp,
            client_type,
            project: first_value(&markers, "project").map(String::from),
            meeting: first_value(&markers, "meeting").map(String::from),
            markers,
        };

        self.store.write(&message).await.map_err(|e| match e {
            already @ ContextError::CaptureFailed(_) => already,
            other => ContextError::CaptureFailed(other.to_string()),
        })?;

        tracing::debug!(
            id = %message.id,
            conversation = %message.conversation_id,
            markers = message.markers.len(),
            client = ?message.client_type,
            "message captured"
        );
        Ok(message)
    }

    /// Most recent messages first. Omitting `client_type` returns every
    /// client's messages.
    pub async fn query_context(
        &self,
        limit: usize,
        project: Option<&str>,
        client_type: Option<ClientType>,
        since: Option<DateTime<Utc>>,
    ) -> ContextResult<Vec<Message>> {
        self.store
            .query_recent(&ActiveQuery {
                limit,
                project: project.map(String::from),
                client_type,
                since,
            })
            .await
    }
}

/// Render messages as a markdown block, one section per message.
pub fn format_context(messages: &[Message]) -> String {
    if messages.is_empty() {
        return NO_ACTIVE_CONTEXT.to_string();
    }

    let mut out = String::from("## Active Context\n");
    for message in messages {
        let _ = write!(
            out,
            "\n### {} ({})",
            message.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            message.role
        );
        if let Some(project) = &message.project {
            let _ = write!(out, " [project::{project}]");
        }
        let _ = write!(out, "\n\n{}\n", message.content);
    }
    out
}
