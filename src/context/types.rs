//! Core record types for the context pipeline.
//!
//! Defines [`Message`] (one captured turn), [`Conversation`] (a group of
//! messages with storage and caller-visible ids), [`Annotation`] (an inline
//! `key::value` marker), and [`SearchResult`] (a message tagged with the tier
//! it came from).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// The cooperating front-end a message was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Terminal coding agent.
    ClaudeCode,
    /// Desktop chat app.
    Desktop,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude_code",
            Self::Desktop => "desktop",
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude_code" => Ok(Self::ClaudeCode),
            "desktop" => Ok(Self::Desktop),
            _ => Err(format!("unknown client type: {s}")),
        }
    }
}

/// An inline `key::value` marker extracted from message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: String,
}

impl Annotation {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A captured message. Immutable once written to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// Caller-visible id of the conversation this message belongs to.
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Front-end that captured the message, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_type: Option<ClientType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting: Option<String>,
    /// Annotations parsed from `content`, in order of appearance.
    pub markers: Vec<Annotation>,
}

/// A group of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Storage identifier.
    pub id: String,
    /// Caller-visible identifier. May differ from `id`.
    pub conv_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub markers: Vec<Annotation>,
}

impl Conversation {
    /// Placeholder conversation for an active-tier message, which carries no
    /// conversation row of its own.
    pub fn for_active(message: &Message) -> Self {
        Self {
            id: message.conversation_id.clone(),
            conv_id: message.conversation_id.clone(),
            title: None,
            created_at: message.timestamp,
            markers: Vec::new(),
        }
    }
}

/// Which tier produced a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    ActiveContext,
    Historical,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveContext => "active_context",
            Self::Historical => "historical",
        }
    }
}

/// A single fused search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub message: Message,
    pub conversation: Conversation,
    /// In `[0.0, 1.0]`. A fixed sentinel for active-tier results.
    pub similarity: f64,
    pub source: Source,
}

/// Canonical storage form for timestamps: RFC 3339, millisecond precision,
/// `Z` suffix. Lexicographic order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored or caller-supplied RFC 3339 timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{s}': {e}"))
}
