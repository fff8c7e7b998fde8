//! Debounced write coalescing.
//!
//! A burst of file writes under the watched directory produces one sync
//! trigger, fired `debounce` after the last write (trailing edge). The state
//! machine lives in a single task:
//!
//! - **Idle**: no timer armed, nothing pending.
//! - **Pending**: a write arrived; its filename is recorded and the timer is
//!   (re-)armed. Further writes re-arm the timer.
//! - **Triggering**: the timer fired; the [`SyncTrigger`] runs with the
//!   pending count. Success or failure, pending is cleared and the task
//!   returns to Idle. Failures are logged and never retried.
//!
//! [`Debouncer`] is the state machine on its own and accepts filenames from
//! any source. [`WriteCoalescer`] feeds it from a recursive `notify` watcher.

use anyhow::{bail, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::SyncTrigger;
use crate::config::{expand_tilde, SyncConfig};

/// Settings for a [`WriteCoalescer`].
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// When false, [`WriteCoalescer::start`] does nothing.
    pub enabled: bool,
    pub debounce: Duration,
    pub daemon_type: String,
    pub watch_dir: PathBuf,
    /// Suffix a changed path must end with, e.g. `.md`.
    pub extension: String,
}

impl From<&SyncConfig> for CoalescerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            enabled: config.enabled,
            debounce: Duration::from_millis(config.debounce_ms),
            daemon_type: config.daemon_type.clone(),
            watch_dir: expand_tilde(&config.watch_dir),
            extension: config.extension.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct CoalescerState {
    pending_writes: BTreeSet<String>,
    armed: bool,
}

/// Trailing-edge debounce over a stream of filenames.
pub struct Debouncer {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the debounce task on the current tokio runtime.
    pub fn spawn(trigger: Arc<dyn SyncTrigger>, daemon_type: String, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_debouncer(rx, trigger, daemon_type, debounce));
        Self { tx, task }
    }

    /// Record a write. Returns false once the task has stopped.
    pub fn record(&self, filename: impl Into<String>) -> bool {
        self.tx.send(filename.into()).is_ok()
    }

    /// A sender for event sources that outlive a borrow of the debouncer.
    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.tx.clone()
    }

    /// Stop the task, discarding any pending writes.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run_debouncer(
    mut rx: mpsc::UnboundedReceiver<String>,
    trigger: Arc<dyn SyncTrigger>,
    daemon_type: String,
    debounce: Duration,
) {
    let mut state = CoalescerState::default();
    let timer = tokio::time::sleep(debounce);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            change = rx.recv() => match change {
                Some(filename) => {
                    state.pending_writes.insert(filename);
                    state.armed = true;
                    timer.as_mut().reset(Instant::now() + debounce);
                    tracing::trace!(pending = state.pending_writes.len(), "write recorded");
                }
                None => break,
            },
            () = &mut timer, if state.armed => {
                state.armed = false;
                let pending = state.pending_writes.len();
                tracing::debug!(files = ?state.pending_writes, "debounce window closed");
                match trigger.trigger(&daemon_type, pending).await {
                    Ok(_) => tracing::info!(daemon = %daemon_type, pending, "sync triggered"),
                    Err(e) => tracing::warn!(
                        daemon = %daemon_type,
                        pending,
                        error = %e,
                        "sync trigger failed; next write starts a new cycle"
                    ),
                }
                state.pending_writes.clear();
            }
        }
    }

    if !state.pending_writes.is_empty() {
        tracing::info!(
            discarded = state.pending_writes.len(),
            "debouncer stopped with pending writes"
        );
    }
}

/// Filenames in `event` that count as writes: non-access events on paths
/// ending in `extension`, relative to `root` where possible.
pub fn tracked_paths(event: &Event, root: &Path, extension: &str) -> Vec<String> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| p.to_string_lossy().ends_with(extension))
        .map(|p| {
            p.strip_prefix(root)
                .unwrap_or(p)
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

struct Running {
    // Dropping the watcher stops filesystem callbacks.
    _watcher: RecommendedWatcher,
    debouncer: Debouncer,
}

/// Caller-owned watcher + debouncer. Construct one per process.
pub struct WriteCoalescer {
    config: CoalescerConfig,
    trigger: Arc<dyn SyncTrigger>,
    running: Option<Running>,
}

impl WriteCoalescer {
    pub fn new(config: CoalescerConfig, trigger: Arc<dyn SyncTrigger>) -> Self {
        Self {
            config,
            trigger,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start watching. Idempotent: a second call while running is a no-op,
    /// as is any call with `enabled = false`. Must run inside a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("sync watcher disabled");
            return Ok(());
        }
        if self.running.is_some() {
            tracing::debug!("sync watcher already running");
            return Ok(());
        }

        let root = self.config.watch_dir.clone();
        if !root.is_dir() {
            bail!("watch directory does not exist: {}", root.display());
        }

        let debouncer = Debouncer::spawn(
            Arc::clone(&self.trigger),
            self.config.daemon_type.clone(),
            self.config.debounce,
        );
        let tx = debouncer.sender();
        let extension = self.config.extension.clone();
        let event_root = root.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for filename in tracked_paths(&event, &event_root, &extension) {
                        let _ = tx.send(filename);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "filesystem watch error"),
            })
            .context("failed to create filesystem watcher")?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        tracing::info!(
            dir = %root.display(),
            extension = %self.config.extension,
            debounce_ms = self.config.debounce.as_millis() as u64,
            daemon = %self.config.daemon_type,
            "sync watcher started"
        );
        self.running = Some(Running {
            _watcher: watcher,
            debouncer,
        });
        Ok(())
    }

    /// Stop watching and drop pending writes. No-op when not running.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.debouncer.shutdown();
            tracing::info!("sync watcher stopped");
        }
    }
}

impl Drop for WriteCoalescer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ContextError, ContextResult};
    use crate::sync::SyncOutcome;
    use async_trait::async_trait;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    #[derive(Debug, Clone, Copy)]
    struct Call {
        at: Instant,
        pending: usize,
    }

    #[derive(Default)]
    struct RecordingTrigger {
        calls: Mutex<Vec<Call>>,
        failures_left: AtomicUsize,
    }

    impl RecordingTrigger {
        fn failing_once() -> Self {
            Self {
                failures_left: AtomicUsize::new(1),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncTrigger for RecordingTrigger {
        async fn trigger(&self, daemon_type: &str, pending: usize) -> ContextResult<SyncOutcome> {
            self.calls.lock().unwrap().push(Call {
                at: Instant::now(),
                pending,
            });
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ContextError::SyncTriggerFailed {
                    daemon: daemon_type.to_string(),
                    reason: "remote unreachable".into(),
                });
            }
            Ok(SyncOutcome::default())
        }
    }

    const WINDOW: Duration = Duration::from_millis(5000);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn assert_near(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + ms(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn burst_fires_once_after_last_write() {
        let trigger = Arc::new(RecordingTrigger::default());
        let start = Instant::now();
        let debouncer = Debouncer::spawn(trigger.clone(), "daily".into(), WINDOW);

        debouncer.record("a.md");
        sleep(ms(1000)).await;
        debouncer.record("b.md");
        sleep(ms(1000)).await;
        debouncer.record("c.md");
        sleep(ms(20_000)).await;

        let calls = trigger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].pending, 3);
        assert_near(calls[0].at - start, ms(7000));
    }

    #[tokio::test(start_paused = true)]
    async fn single_write_fires_after_window() {
        let trigger = Arc::new(RecordingTrigger::default());
        let start = Instant::now();
        let debouncer = Debouncer::spawn(trigger.clone(), "daily".into(), WINDOW);

        debouncer.record("only.md");
        sleep(ms(4999)).await;
        assert!(trigger.calls().is_empty());
        sleep(ms(20_000)).await;

        let calls = trigger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].pending, 1);
        assert_near(calls[0].at - start, ms(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_filename_counts_once() {
        let trigger = Arc::new(RecordingTrigger::default());
        let debouncer = Debouncer::spawn(trigger.clone(), "daily".into(), WINDOW);

        for _ in 0..5 {
            debouncer.record("same.md");
            sleep(ms(100)).await;
        }
        sleep(ms(20_000)).await;

        let calls = trigger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].pending, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separated_bursts_fire_separately() {
        let trigger = Arc::new(RecordingTrigger::default());
        let debouncer = Debouncer::spawn(trigger.clone(), "daily".into(), WINDOW);

        debouncer.record("a.md");
        debouncer.record("b.md");
        sleep(ms(6000)).await;
        debouncer.record("c.md");
        sleep(ms(20_000)).await;

        let pending: Vec<usize> = trigger.calls().iter().map(|c| c.pending).collect();
        assert_eq!(pending, vec![2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_returns_to_idle_without_retry() {
        let trigger = Arc::new(RecordingTrigger::failing_once());
        let debouncer = Debouncer::spawn(trigger.clone(), "daily".into(), WINDOW);

        debouncer.record("a.md");
        sleep(ms(30_000)).await;
        assert_eq!(trigger.calls().len(), 1, "failed trigger must not be retried");

        debouncer.record("b.md");
        sleep(ms(30_000)).await;
        let calls = trigger.calls();
        assert_eq!(calls.len(), 2);
        // the failed cycle's pending set was cleared
        assert_eq!(calls[1].pending, 1);
    }

    #[tokio::test]
    async fn record_after_shutdown_reports_stopped() {
        let trigger = Arc::new(RecordingTrigger::default());
        let debouncer = Debouncer::spawn(trigger, "daily".into(), WINDOW);
        let tx = debouncer.sender();
        debouncer.shutdown();
        // the aborted task drops its receiver once it is cancelled
        tokio::task::yield_now().await;
        sleep(ms(10)).await;
        assert!(tx.send("late.md".into()).is_err());
    }

    #[test]
    fn tracked_paths_filters_extension_and_access() {
        let root = Path::new("/notes");
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/notes/2025/10-24.md"))
            .add_path(PathBuf::from("/notes/scratch.txt"));
        assert_eq!(tracked_paths(&event, root, ".md"), vec!["2025/10-24.md"]);

        let access = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/notes/read.md"));
        assert!(tracked_paths(&access, root, ".md").is_empty());

        let outside = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/elsewhere/x.md"));
        assert_eq!(tracked_paths(&outside, root, ".md"), vec!["/elsewhere/x.md"]);
    }

    fn config(dir: &Path, enabled: bool) -> CoalescerConfig {
        CoalescerConfig {
            enabled,
            debounce: ms(100),
            daemon_type: "daily".into(),
            watch_dir: dir.to_path_buf(),
            extension: ".md".into(),
        }
    }

    #[tokio::test]
    async fn disabled_never_starts() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut coalescer =
            WriteCoalescer::new(config(dir.path(), false), Arc::new(RecordingTrigger::default()));
        coalescer.start().unwrap();
        assert!(!coalescer.is_running());
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut coalescer =
            WriteCoalescer::new(config(dir.path(), true), Arc::new(RecordingTrigger::default()));
        coalescer.start().unwrap();
        coalescer.start().unwrap();
        assert!(coalescer.is_running());
        coalescer.stop();
        assert!(!coalescer.is_running());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let mut coalescer = WriteCoalescer::new(
            config(Path::new("/nonexistent/evna-watch"), true),
            Arc::new(RecordingTrigger::default()),
        );
        let err = coalescer.start().unwrap_err();
        assert!(err.to_string().contains("watch directory does not exist"));
        assert!(!coalescer.is_running());
    }
}
