//! Working memory for AI agents over a running log of conversation messages.
//!
//! evna captures messages as they happen, extracts inline `key::value`
//! annotations, and answers queries by fusing two sources into one ranked,
//! deduplicated list:
//!
//! | Tier | Contents | Ranking |
//! |------|----------|---------|
//! | **Active** | Recently captured messages | Newest first |
//! | **Historical** | Archived conversations | BM25 similarity |
//!
//! Two front-ends (a terminal agent and a desktop app) share the active
//! stream; a client-aware session decides how much of the other client's
//! activity each query sees. A separate watcher coalesces bursts of writes
//! to a notes directory into one downstream sync.
//!
//! # Modules
//!
//! - [`context`]: annotation parsing, the active stream, sessions and fusion
//! - [`store`]: storage traits and the SQLite implementation
//! - [`sync`]: debounced write coalescing and the sync script trigger
//! - [`config`]: TOML configuration with environment overrides
//! - [`db`]: database open, schema and migrations
//! - [`tools`] / [`server`]: the MCP stdio server

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod server;
pub mod store;
pub mod sync;
pub mod tools;
