//! Two-tier retrieval: recent active context fused with historical search.
//!
//! The active tier is cheap and already scoped by project and time, so it
//! gets a small quota and is ranked by recency. The historical tier is
//! over-fetched so deduplication against the active tier does not starve the
//! final list. Active results always come first.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::context::active::ActiveContextStream;
use crate::context::types::{Conversation, SearchResult, Source};
use crate::error::{ContextResult, Tier};
use crate::store::{HistoricalQuery, HistoricalSearch};

/// Rendered in place of an empty result list.
pub const NO_RESULTS: &str = "**No results found**";

/// Similarity assigned to active-tier results. Marks them as recency-ranked,
/// not scored.
pub const ACTIVE_SIMILARITY: f64 = 0.9;

/// Characters of content that take part in the dedup key.
const DEDUP_PREFIX_CHARS: usize = 50;

/// Tuning for [`FusionRetriever`]. Defaults mirror [`RetrievalConfig`].
#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub active_ratio: f64,
    pub active_floor: usize,
    pub lookback_days: i64,
    pub historical_overfetch: usize,
    pub default_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for FusionConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            active_ratio: config.active_ratio,
            active_floor: config.active_floor,
            lookback_days: config.lookback_days,
            historical_overfetch: config.historical_overfetch,
            default_threshold: config.default_threshold,
        }
    }
}

/// A fused search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub project: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub threshold: Option<f64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            project: None,
            since: None,
            threshold: None,
        }
    }
}

pub struct FusionRetriever {
    active: Arc<ActiveContextStream>,
    historical: Arc<dyn HistoricalSearch>,
    config: FusionConfig,
}

impl FusionRetriever {
    pub fn new(
        active: Arc<ActiveContextStream>,
        historical: Arc<dyn HistoricalSearch>,
        config: FusionConfig,
    ) -> Self {
        Self {
            active,
            historical,
            config,
        }
    }

    /// Size of the active-tier request for a given `limit`.
    pub fn active_quota(&self, limit: usize) -> usize {
        ((limit as f64 * self.config.active_ratio).floor() as usize).max(self.config.active_floor)
    }

    /// Query both tiers concurrently and fuse the results.
    ///
    /// A failure in either tier is returned as
    /// [`ContextError::RetrievalFailed`](crate::error::ContextError::RetrievalFailed);
    /// a partial answer is never returned.
    pub async fn search(&self, request: &SearchRequest) -> ContextResult<Vec<SearchResult>> {
        let since = request
            .since
            .unwrap_or_else(|| Utc::now() - Duration::days(self.config.lookback_days));
        let active_quota = self.active_quota(request.limit);
        let historical_query = HistoricalQuery {
            query: request.query.clone(),
            limit: request
                .limit
                .saturating_mul(self.config.historical_overfetch),
            project: request.project.clone(),
            since: Some(since),
            threshold: request.threshold.unwrap_or(self.config.default_threshold),
        };

        let (active, historical) = tokio::join!(
            self.active
                .query_context(active_quota, request.project.as_deref(), None, Some(since)),
            self.historical.search(&historical_query),
        );
        let active = active.map_err(|e| e.into_retrieval(Tier::Active))?;
        let historical = historical.map_err(|e| e.into_retrieval(Tier::Historical))?;

        tracing::debug!(
            query = %request.query,
            active = active.len(),
            historical = historical.len(),
            active_quota,
            "fusing retrieval tiers"
        );

        let active = active.into_iter().map(|message| SearchResult {
            conversation: Conversation::for_active(&message),
            message,
            similarity: ACTIVE_SIMILARITY,
            source: Source::ActiveContext,
        });
        let historical = historical.into_iter().map(|mut result| {
            result.source = Source::Historical;
            result
        });

        Ok(fuse(active.chain(historical), request.limit))
    }
}

/// Deduplicate in input order (first occurrence wins) and truncate to `limit`.
pub fn fuse(results: impl IntoIterator<Item = SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(dedup_key(r)))
        .take(limit)
        .collect()
}

/// `conversation_id :: timestamp :: first 50 chars of content`.
///
/// Tiers do not share a stable message id, so identity is approximated from
/// these three fields.
pub fn dedup_key(result: &SearchResult) -> String {
    let prefix: String = result
        .message
        .content
        .chars()
        .take(DEDUP_PREFIX_CHARS)
        .collect();
    format!(
        "{}::{}::{}",
        result.message.conversation_id,
        result.message.timestamp.to_rfc3339(),
        prefix
    )
}

/// Render fused results as numbered markdown sections.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    let sections: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let message = &result.message;
            let is_active = result.source == Source::ActiveContext;
            let title = match (&result.conversation.title, is_active) {
                (Some(title), _) => title.as_str(),
                (None, true) => "Active Context",
                (None, false) => result.conversation.conv_id.as_str(),
            };

            let mut section = format!(
                "### {}. {}",
                i + 1,
                message.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
            if let Some(project) = &message.project {
                let _ = write!(section, " [project::{project}]");
            }
            if is_active {
                section.push_str(" 🔴 recent");
            }
            let _ = write!(
                section,
                "\n**Similarity**: {:.2} | **Conversation**: {} | **Role**: {}\n\n{}\n",
                result.similarity, title, message.role, message.content
            );
            section
        })
        .collect();

    sections.join("\n---\n\n")
}
