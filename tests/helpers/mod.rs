#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use evna::context::active::ActiveContextStream;
use evna::context::annotations;
use evna::context::types::{ClientType, Message, Role};
use evna::db;
use evna::store::{ProjectAliases, SqliteStore};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// A store over a fresh in-memory database, with `evna` aliased to
/// `evna-next` and `evna_mcp`.
pub fn test_store() -> Arc<SqliteStore> {
    let mut aliases = HashMap::new();
    aliases.insert(
        "evna".to_string(),
        vec!["evna-next".to_string(), "evna_mcp".to_string()],
    );
    Arc::new(SqliteStore::new(
        Arc::new(Mutex::new(test_db())),
        ProjectAliases::new(aliases),
    ))
}

pub fn stream(store: &Arc<SqliteStore>) -> ActiveContextStream {
    ActiveContextStream::new(store.clone())
}

/// `minutes` before now, truncated to whole milliseconds like stored values.
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    let now = Utc::now() - Duration::minutes(minutes);
    Utc.timestamp_millis_opt(now.timestamp_millis()).unwrap()
}

/// Build a message the way capture does, for direct archive inserts.
pub fn message(conv: &str, role: Role, content: &str, timestamp: DateTime<Utc>) -> Message {
    let markers = annotations::parse(content);
    Message {
        id: uuid::Uuid::now_v7().to_string(),
        conversation_id: conv.to_string(),
        role,
        content: content.to_string(),
        timestamp,
        client_type: Some(ClientType::ClaudeCode),
        project: annotations::first_value(&markers, "project").map(String::from),
        meeting: annotations::first_value(&markers, "meeting").map(String::from),
        markers,
    }
}
