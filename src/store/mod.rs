//! Storage collaborators for the context pipeline.
//!
//! The pipeline depends only on the [`DataStore`] (recency tier) and
//! [`HistoricalSearch`] (similarity tier) traits. [`SqliteStore`] implements
//! both over a single rusqlite connection; the synchronous SQL lives in
//! [`active`] and [`archive`] and is driven through `spawn_blocking`.

pub mod active;
pub mod archive;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::context::types::{ClientType, Message, SearchResult};
use crate::error::{ContextError, ContextResult};

/// Parameters for a recency query against the active tier.
#[derive(Debug, Clone, Default)]
pub struct ActiveQuery {
    pub limit: usize,
    /// Raw project string; the store expands aliases.
    pub project: Option<String>,
    /// `None` returns messages from every client.
    pub client_type: Option<ClientType>,
    pub since: Option<DateTime<Utc>>,
}

/// Parameters for a similarity query against the historical tier.
#[derive(Debug, Clone)]
pub struct HistoricalQuery {
    pub query: String,
    pub limit: usize,
    pub project: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub threshold: f64,
}

/// Recency-tier persistence.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Persist one captured message.
    async fn write(&self, message: &Message) -> ContextResult<()>;

    /// Most recent messages first, filtered by `query`.
    async fn query_recent(&self, query: &ActiveQuery) -> ContextResult<Vec<Message>>;
}

/// Long-horizon similarity search.
#[async_trait]
pub trait HistoricalSearch: Send + Sync {
    /// Results ordered by similarity, highest first.
    async fn search(&self, query: &HistoricalQuery) -> ContextResult<Vec<SearchResult>>;
}

/// Project alias table: canonical name → alternative spellings.
#[derive(Debug, Clone, Default)]
pub struct ProjectAliases {
    aliases: HashMap<String, Vec<String>>,
}

impl ProjectAliases {
    pub fn new(aliases: HashMap<String, Vec<String>>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(k, v)| {
                (
                    k.to_lowercase(),
                    v.into_iter().map(|a| a.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { aliases }
    }

    /// Every lowercase spelling that should match `project`: the project
    /// itself, its aliases if it is canonical, and its canonical name plus
    /// sibling aliases if it is an alias.
    pub fn expand(&self, project: &str) -> Vec<String> {
        let needle = project.trim().to_lowercase();
        let mut names = vec![needle.clone()];
        for (canonical, alts) in &self.aliases {
            if *canonical == needle || alts.contains(&needle) {
                names.push(canonical.clone());
                names.extend(alts.iter().cloned());
            }
        }
        names.sort();
        names.dedup();
        names
    }

    /// SQL predicate over `column` plus its bound values: exact match on any
    /// expanded spelling, or literal substring match on the raw project.
    pub(crate) fn predicate(&self, column: &str, project: &str) -> (String, Vec<Value>) {
        let names = self.expand(project);
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "(lower({column}) IN ({placeholders}) \
             OR lower({column}) LIKE '%' || ? || '%' ESCAPE '\\')"
        );
        let mut params: Vec<Value> = names.into_iter().map(Value::Text).collect();
        params.push(Value::Text(escape_like(&project.trim().to_lowercase())));
        (sql, params)
    }
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// SQLite-backed implementation of both storage collaborators.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
    aliases: Arc<ProjectAliases>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>, aliases: ProjectAliases) -> Self {
        Self {
            db,
            aliases: Arc::new(aliases),
        }
    }

    /// Shared connection handle, for maintenance paths.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> ContextResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &ProjectAliases) -> ContextResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let aliases = Arc::clone(&self.aliases);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| ContextError::Store(format!("db lock poisoned: {e}")))?;
            f(&mut conn, &aliases)
        })
        .await
        .map_err(|e| ContextError::Store(format!("db task failed: {e}")))?
    }

    /// Insert one message straight into the archive under an optional
    /// conversation title. Returns `false` if it was already archived.
    pub async fn archive_message(
        &self,
        message: &Message,
        title: Option<&str>,
    ) -> ContextResult<bool> {
        let message = message.clone();
        let title = title.map(String::from);
        self.with_conn(move |conn, _| archive::archive_message(conn, &message, title.as_deref()))
            .await
    }

    /// Move active-tier rows older than `cutoff` into the archive.
    pub async fn archive_expired(&self, cutoff: DateTime<Utc>) -> ContextResult<usize> {
        self.with_conn(move |conn, _| archive::archive_expired(conn, cutoff))
            .await
    }
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn write(&self, message: &Message) -> ContextResult<()> {
        let message = message.clone();
        self.with_conn(move |conn, _| active::insert_message(conn, &message))
            .await
    }

    async fn query_recent(&self, query: &ActiveQuery) -> ContextResult<Vec<Message>> {
        let query = query.clone();
        self.with_conn(move |conn, aliases| active::query_recent(conn, aliases, &query))
            .await
    }
}

#[async_trait]
impl HistoricalSearch for SqliteStore {
    async fn search(&self, query: &HistoricalQuery) -> ContextResult<Vec<SearchResult>> {
        let query = query.clone();
        self.with_conn(move |conn, aliases| archive::search(conn, aliases, &query))
            .await
    }
}
