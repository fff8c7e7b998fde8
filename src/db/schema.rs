//! SQL DDL for all evna tables.
//!
//! Defines `active_context` (recency tier), `conversations` and `messages`
//! (historical archive), `messages_fts` (FTS5 over archived content), and
//! `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Recency tier: freshly captured messages, newest read first
CREATE TABLE IF NOT EXISTS active_context (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK(role IN ('user','assistant','system')),
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    client_type TEXT CHECK(client_type IS NULL OR client_type IN ('claude_code','desktop')),
    project TEXT,
    meeting TEXT,
    markers TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_active_timestamp ON active_context(timestamp);
CREATE INDEX IF NOT EXISTS idx_active_project ON active_context(project);

-- Historical archive
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    conv_id TEXT NOT NULL UNIQUE,
    title TEXT,
    created_at TEXT NOT NULL,
    markers TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(conv_id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK(role IN ('user','assistant','system')),
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    client_type TEXT,
    project TEXT,
    meeting TEXT,
    markers TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_project ON messages(project);

-- Full-text search (BM25) over archived content
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content,
    content='messages',
    content_rowid='rowid'
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
