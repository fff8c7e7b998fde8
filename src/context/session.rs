//! Client-aware context selection.
//!
//! Two front-ends share one active stream. On the first message of a turn
//! the asking client sees everything, including what the other client has
//! been doing. Mid-turn it sees only its own messages, optionally topped up
//! with a short tail of the other client's most recent ones.

use chrono::Utc;
use std::sync::Arc;

use crate::context::active::ActiveContextStream;
use crate::context::types::{ClientType, Message, Role};
use crate::error::{ContextError, ContextResult};

/// The conversation and client a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    pub conversation_id: String,
    pub client_type: ClientType,
}

pub struct ClientAwareSession {
    stream: Arc<ActiveContextStream>,
    session: Option<Session>,
    cross_client_tail: usize,
}

impl ClientAwareSession {
    /// `cross_client_tail` is how many other-client messages a mid-turn
    /// query still includes. Zero disables the tail.
    pub fn new(stream: Arc<ActiveContextStream>, cross_client_tail: usize) -> Self {
        Self {
            stream,
            session: None,
            cross_client_tail,
        }
    }

    pub fn set_session(&mut self, conversation_id: impl Into<String>, current_client: ClientType) {
        let session = Session {
            conversation_id: conversation_id.into(),
            client_type: current_client,
        };
        tracing::debug!(
            conversation = %session.conversation_id,
            client = %session.client_type,
            "session bound"
        );
        self.session = Some(session);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// First message: unfiltered by client. Later messages: the current
    /// client's messages plus the configured cross-client tail, newest first.
    /// The tail takes its slots out of `limit`, so at most `limit` messages
    /// come back. Without a bound session every query is unfiltered.
    pub async fn get_client_aware_context(
        &self,
        is_first_message: bool,
        project: Option<&str>,
        limit: usize,
    ) -> ContextResult<Vec<Message>> {
        let current = match (&self.session, is_first_message) {
            (Some(session), false) => session.client_type,
            _ => return self.stream.query_context(limit, project, None, None).await,
        };

        let mut own = self
            .stream
            .query_context(limit, project, Some(current), None)
            .await?;

        let tail_slots = self.cross_client_tail.min(limit);
        if tail_slots > 0 {
            // Over-fetch so the other client's messages survive dropping our own.
            let recent = self
                .stream
                .query_context(limit.saturating_add(tail_slots), project, None, None)
                .await?;
            let tail: Vec<Message> = recent
                .into_iter()
                .filter(|m| m.client_type != Some(current))
                .take(tail_slots)
                .collect();
            own.truncate(limit - tail.len());
            own.extend(tail);
            own.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }

        Ok(own)
    }

    /// Capture into the bound conversation as the bound client.
    ///
    /// Fails with [`ContextError::CaptureFailed`] when no session is bound.
    pub async fn capture(&self, role: Role, content: &str) -> ContextResult<Message> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ContextError::CaptureFailed("no session bound".into()))?;
        self.stream
            .capture_message(
                &session.conversation_id,
                role,
                content,
                Utc::now(),
                Some(session.client_type),
            )
            .await
    }
}
