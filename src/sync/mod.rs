//! Downstream sync triggering.
//!
//! [`SyncTrigger`] is the out-of-process action the [`coalescer`] fires once
//! per burst of writes. [`CommandSyncTrigger`] runs a sync script as
//! `<script> trigger <daemon_type>` and enforces its own timeout.

pub mod coalescer;

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{ContextError, ContextResult};

/// Captured output of a completed sync run. Opaque; only logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait SyncTrigger: Send + Sync {
    /// Run one sync for `daemon_type`. `pending` is the number of distinct
    /// files written since the last sync.
    async fn trigger(&self, daemon_type: &str, pending: usize) -> ContextResult<SyncOutcome>;
}

/// Runs an external sync script with a bounded runtime.
pub struct CommandSyncTrigger {
    script: PathBuf,
    timeout: Duration,
}

impl CommandSyncTrigger {
    pub fn new(script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            script: script.into(),
            timeout,
        }
    }

    pub fn from_config(config: &crate::config::SyncConfig) -> Self {
        Self::new(
            crate::config::expand_tilde(&config.script),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl SyncTrigger for CommandSyncTrigger {
    async fn trigger(&self, daemon_type: &str, pending: usize) -> ContextResult<SyncOutcome> {
        let failed = |reason: String| ContextError::SyncTriggerFailed {
            daemon: daemon_type.to_string(),
            reason,
        };

        tracing::info!(
            script = %self.script.display(),
            daemon = daemon_type,
            pending,
            "triggering sync"
        );

        let child = Command::new(&self.script)
            .arg("trigger")
            .arg(daemon_type)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(format!("failed to spawn {}: {e}", self.script.display())))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| failed(format!("timed out after {}s", self.timeout.as_secs_f64())))?
            .map_err(|e| failed(format!("failed to wait for sync: {e}")))?;

        let outcome = SyncOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        if !outcome.stdout.is_empty() {
            tracing::debug!(daemon = daemon_type, stdout = %outcome.stdout, "sync output");
        }
        if !outcome.stderr.is_empty() {
            tracing::debug!(daemon = daemon_type, stderr = %outcome.stderr, "sync stderr");
        }

        if !output.status.success() {
            return Err(failed(format!(
                "exited with {}: {}",
                output.status, outcome.stderr
            )));
        }
        Ok(outcome)
    }
}
