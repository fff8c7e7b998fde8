//! Historical tier SQL: the conversation/message archive and its FTS5 index.
//!
//! Similarity is derived from the FTS5 BM25 rank: with `s = -rank` (FTS5
//! ranks are negative, more negative is better) the score is `s / (1 + s)`,
//! which lies in `[0, 1)` and preserves BM25 order.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::active::{delete_messages, sql_limit, MessageRow, MESSAGE_COLUMNS};
use super::{HistoricalQuery, ProjectAliases};
use crate::context::types::{
    format_timestamp, parse_timestamp, Conversation, Message, SearchResult, Source,
};
use crate::error::{ContextError, ContextResult};

/// Archive one message, creating its conversation row if needed.
///
/// Returns `false` if a message with the same id was already archived.
pub fn archive_message(
    conn: &Connection,
    message: &Message,
    title: Option<&str>,
) -> ContextResult<bool> {
    ensure_conversation(conn, &message.conversation_id, title, &message.timestamp)?;

    let markers = serde_json::to_string(&message.markers)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO messages (id, conversation_id, role, content, timestamp, client_type, project, meeting, markers) \
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
    if inserted == 0 {
        return Ok(false);
    }

    // Must use the same rowid as the corresponding `messages` row.
    let rowid = conn.last_insert_rowid();
    conn.execute(
        "INSERT INTO messages_fts (rowid, content) VALUES (?1, ?2)",
        params![rowid, message.content],
    )?;
    Ok(true)
}

/// Look up or create the conversation with caller-visible id `conv_id`.
/// Returns its storage id. A given `title` fills in a missing one.
pub fn ensure_conversation(
    conn: &Connection,
    conv_id: &str,
    title: Option<&str>,
    created_at: &DateTime<Utc>,
) -> ContextResult<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM conversations WHERE conv_id = ?1",
            params![conv_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        if let Some(title) = title {
            conn.execute(
                "UPDATE conversations SET title = ?1 WHERE id = ?2 AND title IS NULL",
                params![title, id],
            )?;
        }
        return Ok(id);
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO conversations (id, conv_id, title, created_at, markers) VALUES (?1, ?2, ?3, ?4, '[]')",
        params![id, conv_id, title, format_timestamp(created_at)],
    )?;
    Ok(id)
}

/// Move every active-tier message older than `cutoff` into the archive.
///
/// Runs in one transaction. Returns the number of messages moved.
pub fn archive_expired(conn: &mut Connection, cutoff: DateTime<Utc>) -> ContextResult<usize> {
    let tx = conn.transaction()?;

    let expired: Vec<Message> = {
        let mut stmt = tx.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM active_context WHERE timestamp < ?1 ORDER BY timestamp"
        ))?;
        let rows = stmt
            .query_map(params![format_timestamp(&cutoff)], |row| {
                MessageRow::from_row(row, 0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(MessageRow::into_message)
            .collect::<ContextResult<Vec<_>>>()?
    };

    for message in &expired {
        archive_message(&tx, message, None)?;
    }
    let ids: Vec<String> = expired.into_iter().map(|m| m.id).collect();
    let moved = delete_messages(&tx, &ids)?;

    tx.commit()?;
    tracing::info!(moved, cutoff = %format_timestamp(&cutoff), "archived expired active context");
    Ok(moved)
}

/// BM25 keyword search over archived messages.
pub fn search(
    conn: &Connection,
    aliases: &ProjectAliases,
    query: &HistoricalQuery,
) -> ContextResult<Vec<SearchResult>> {
    let escaped = escape_fts_query(&query.query);
    if escaped.is_empty() || query.limit == 0 {
        return Ok(Vec::new());
    }

    let mut clauses = vec!["messages_fts MATCH ?".to_string()];
    let mut values: Vec<Value> = vec![Value::Text(escaped)];

    if let Some(since) = &query.since {
        clauses.push("m.timestamp >= ?".into());
        values.push(Value::Text(format_timestamp(since)));
    }
    if let Some(project) = query.project.as_deref().filter(|p| !p.trim().is_empty()) {
        let (sql, params) = aliases.predicate("m.project", project);
        clauses.push(sql);
        values.extend(params);
    }
    values.push(Value::Integer(sql_limit(query.limit)));

    let sql = format!(
        "SELECT m.id, m.conversation_id, m.role, m.content, m.timestamp, m.client_type, \
         m.project, m.meeting, m.markers, \
         c.id, c.conv_id, c.title, c.created_at, c.markers, messages_fts.rank \
         FROM messages_fts \
         JOIN messages m ON m.rowid = messages_fts.rowid \
         JOIN conversations c ON c.conv_id = m.conversation_id \
         WHERE {} ORDER BY messages_fts.rank LIMIT ?",
        clauses.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok((
                MessageRow::from_row(row, 0)?,
                ConversationRow {
                    id: row.get(9)?,
                    conv_id: row.get(10)?,
                    title: row.get(11)?,
                    created_at: row.get(12)?,
                    markers: row.get(13)?,
                },
                row.get::<_, f64>(14)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::with_capacity(rows.len());
    for (message, conversation, rank) in rows {
        let similarity = rank_to_similarity(rank);
        if similarity < query.threshold {
            continue;
        }
        results.push(SearchResult {
            message: message.into_message()?,
            conversation: conversation.into_conversation()?,
            similarity,
            source: Source::Historical,
        });
    }

    tracing::debug!(
        requested = query.limit,
        returned = results.len(),
        threshold = query.threshold,
        "historical search"
    );
    Ok(results)
}

struct ConversationRow {
    id: String,
    conv_id: String,
    title: Option<String>,
    created_at: String,
    markers: String,
}

impl ConversationRow {
    fn into_conversation(self) -> ContextResult<Conversation> {
        Ok(Conversation {
            created_at: parse_timestamp(&self.created_at).map_err(ContextError::Store)?,
            markers: serde_json::from_str(&self.markers)?,
            id: self.id,
            conv_id: self.conv_id,
            title: self.title,
        })
    }
}

fn rank_to_similarity(rank: f64) -> f64 {
    let score = (-rank).max(0.0);
    score / (1.0 + score)
}

/// Escape a free-text query for FTS5 MATCH.
///
/// Each whitespace-delimited word is quoted so FTS5 syntax characters are
/// inert; words are OR-ed so partial matches still rank.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "")))
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" OR ")
}
