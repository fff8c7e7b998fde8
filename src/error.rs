//! Typed failures surfaced by the context pipeline.
//!
//! Annotation parsing has no failure state. Everything else reports one of
//! the variants below to its immediate caller; the binary and MCP layers turn
//! them into `anyhow` errors or tool error strings.

use thiserror::Error;

/// Which retrieval tier a [`ContextError::RetrievalFailed`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Active,
    Historical,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Historical => "historical",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    /// The data store rejected or could not accept a captured message.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// One of the two retrieval tiers failed. Never folded into an empty list.
    #[error("{tier} retrieval failed: {reason}")]
    RetrievalFailed { tier: Tier, reason: String },

    /// The external sync action errored or timed out.
    #[error("sync trigger failed for daemon '{daemon}': {reason}")]
    SyncTriggerFailed { daemon: String, reason: String },

    /// Raw store failure, before a pipeline stage classifies it.
    #[error("store error: {0}")]
    Store(String),
}

impl ContextError {
    /// Reclassify a store-level failure as a retrieval failure for `tier`.
    pub fn into_retrieval(self, tier: Tier) -> Self {
        match self {
            already @ Self::RetrievalFailed { .. } => already,
            other => Self::RetrievalFailed {
                tier,
                reason: other.reason(),
            },
        }
    }

    fn reason(&self) -> String {
        match self {
            Self::CaptureFailed(r) | Self::Store(r) => r.clone(),
            Self::RetrievalFailed { reason, .. } | Self::SyncTriggerFailed { reason, .. } => {
                reason.clone()
            }
        }
    }
}

impl From<rusqlite::Error> for ContextError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for ContextError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(format!("markers encoding: {e}"))
    }
}

pub type ContextResult<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_reclassified_with_tier() {
        let err = ContextError::Store("disk I/O error".into()).into_retrieval(Tier::Historical);
        match &err {
            ContextError::RetrievalFailed { tier, reason } => {
                assert_eq!(*tier, Tier::Historical);
                assert_eq!(reason, "disk I/O error");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "historical retrieval failed: disk I/O error"
        );
    }

    #[test]
    fn retrieval_error_keeps_original_tier() {
        let err = ContextError::RetrievalFailed {
            tier: Tier::Active,
            reason: "timeout".into(),
        }
        .into_retrieval(Tier::Historical);
        assert!(matches!(
            err,
            ContextError::RetrievalFailed {
                tier: Tier::Active,
                ..
            }
        ));
    }
}
