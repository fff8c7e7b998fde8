//! Active tier SQL: write captured messages, read them back newest first.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use super::{ActiveQuery, ProjectAliases};
use crate::context::types::{format_timestamp, parse_timestamp, Message};
use crate::error::{ContextError, ContextResult};

/// Column list shared by every message SELECT. Order matches [`MessageRow::from_row`].
pub(crate) const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, content, timestamp, client_type, project, meeting, markers";

/// Raw message columns as stored; converted to [`Message`] outside the row closure.
pub(crate) struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    timestamp: String,
    client_type: Option<String>,
    project: Option<String>,
    meeting: Option<String>,
    markers: String,
}

impl MessageRow {
    /// Read the nine message columns starting at `offset`.
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            conversation_id: row.get(offset + 1)?,
            role: row.get(offset + 2)?,
            content: row.get(offset + 3)?,
            timestamp: row.get(offset + 4)?,
            client_type: row.get(offset + 5)?,
            project: row.get(offset + 6)?,
            meeting: row.get(offset + 7)?,
            markers: row.get(offset + 8)?,
        })
    }

    pub(crate) fn into_message(self) -> ContextResult<Message> {
        Ok(Message {
            role: self.role.parse().map_err(ContextError::Store)?,
            timestamp: parse_timestamp(&self.timestamp).map_err(ContextError::Store)?,
            client_type: self
                .client_type
                .map(|c| c.parse())
                .transpose()
                .map_err(ContextError::Store)?,
            markers: serde_json::from_str(&self.markers)?,
            id: self.id,
            conversation_id: self.conversation_id,
            content: self.content,
            project: self.project,
            meeting: self.meeting,
        })
    }
}

/// `LIMIT` value for a row count. A negative SQLite limit means unbounded, so
/// counts past `i64::MAX` saturate instead of wrapping.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Insert one message into `active_context`.
pub fn insert_message(conn: &Connection, message: &Message) -> ContextResult<()> {
    let markers = serde_json::to_string(&message.markers)?;
    conn.execute(
        "INSERT INTO active_context (id, conversation_id, role, content, timestamp, client_type, project, meeting, markers) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            message.id,
            message.conversation_id,
            message.role.as_str(),
            message.content,
            format_timestamp(&message.timestamp),
            message.client_type.map(|c| c.as_str()),
            message.project,
            message.meeting,
            markers,
        ],
    )?;
    Ok(())
}

/// Newest-first recency query with optional project, client and time filters.
pub fn query_recent(
    conn: &Connection,
    aliases: &ProjectAliases,
    query: &ActiveQuery,
) -> ContextResult<Vec<Message>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(since) = &query.since {
        clauses.push("timestamp >= ?".into());
        values.push(Value::Text(format_timestamp(since)));
    }
    if let Some(client) = query.client_type {
        clauses.push("client_type = ?".into());
        values.push(Value::Text(client.as_str().into()));
    }
    if let Some(project) = query.project.as_deref().filter(|p| !p.trim().is_empty()) {
        let (sql, params) = aliases.predicate("project", project);
        clauses.push(sql);
        values.extend(params);
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM active_context {where_sql} \
         ORDER BY timestamp DESC LIMIT ?"
    );
    values.push(Value::Integer(sql_limit(query.limit)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| MessageRow::from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(MessageRow::into_message).collect()
}

/// Delete active rows by id. Returns the number removed.
pub fn delete_messages(conn: &Connection, ids: &[String]) -> ContextResult<usize> {
    let mut stmt = conn.prepare("DELETE FROM active_context WHERE id = ?1")?;
    let mut removed = 0;
    for id in ids {
        removed += stmt.execute(params![id])?;
    }
    Ok(removed)
}
