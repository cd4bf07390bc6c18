// ─── Download Engine ───
// Supervisor for a batch of tasks: pre-check, partition across workers,
// watch for stalls and restart whatever is left.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::client::Fetcher;
use super::extract::post_process;
use super::integrity::is_valid;
use super::launcher::{ProcessLauncher, TaskLauncher, WorkerHandle, WorkerLauncher};
use super::task::DownloadTask;
use super::worker::WorkerMessage;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{DownloadEvent, EventBus, FailKind};
use crate::core::state::{LauncherContext, WorkerMode};

/// Outcome of one `download()` call.
///
/// `Done` is published even when tasks failed; `failed` lists the keys that
/// exhausted their retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Unique tasks after deduplication.
    pub total: usize,
    /// Tasks completed by the supervisor pre-check without a worker.
    pub skipped: usize,
    /// Tasks handed to workers.
    pub dispatched: usize,
    pub failed: Vec<String>,
    pub restarts: u32,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

enum AttemptOutcome {
    Finished,
    Stalled,
}

/// Watchdog window for `attempt` (1-based).
pub fn watchdog_window(base: Duration, attempt: u32) -> Duration {
    base * attempt.max(1)
}

pub struct DownloadEngine {
    ctx: LauncherContext,
    launcher: Arc<dyn WorkerLauncher>,
    events: EventBus,
    watchdog_base: Duration,
    workers: usize,
}

impl DownloadEngine {
    /// Engine using the worker mode from the context settings.
    pub fn new(ctx: LauncherContext, fetcher: Arc<dyn Fetcher>) -> LauncherResult<Self> {
        let retries = ctx.settings().retries;
        let launcher: Arc<dyn WorkerLauncher> = match ctx.worker_mode() {
            WorkerMode::Task => Arc::new(TaskLauncher::new(fetcher, retries)),
            WorkerMode::Process => Arc::new(ProcessLauncher::current_exe(retries)?),
        };
        Ok(Self::with_launcher(ctx, launcher))
    }

    pub fn with_launcher(ctx: LauncherContext, launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self {
            watchdog_base: ctx.watchdog_base(),
            workers: ctx.settings().worker_count(),
            ctx,
            launcher,
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_watchdog(mut self, base: Duration) -> Self {
        self.watchdog_base = base;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn context(&self) -> &LauncherContext {
        &self.ctx
    }

    /// Download tasks whose destinations lie under the launcher root.
    ///
    /// Only a security violation is an `Err`; per-task failures are reported
    /// through events and the returned [`BatchReport`].
    pub async fn download(&self, tasks: Vec<DownloadTask>) -> LauncherResult<BatchReport> {
        let root = self.ctx.root();
        for task in &tasks {
            task.ensure_no_traversal()?;
            let outside_target = task
                .unzip
                .as_ref()
                .map_or(false, |u| !u.target_dir().starts_with(root));
            if !task.destination().starts_with(root) || outside_target {
                return Err(LauncherError::PathTraversal(task.key.clone()));
            }
        }
        self.run(tasks).await
    }

    /// Download tasks whose segments are relative to `root` (instance files).
    /// Every task is validated before anything is dispatched.
    pub async fn download_into(
        &self,
        root: &Path,
        tasks: Vec<DownloadTask>,
    ) -> LauncherResult<BatchReport> {
        let rebased = tasks
            .into_iter()
            .map(|task| task.rebased(root))
            .collect::<LauncherResult<Vec<_>>>()?;
        self.run(rebased).await
    }

    async fn run(&self, tasks: Vec<DownloadTask>) -> LauncherResult<BatchReport> {
        let ordered = dedup_by_key(sort_by_size(tasks));
        let mut report = BatchReport {
            total: ordered.len(),
            ..BatchReport::default()
        };

        let pending = self.precheck(ordered, &mut report).await;
        if pending.is_empty() {
            info!("Nothing to download ({} files already present)", report.skipped);
            self.events.publish(DownloadEvent::Done);
            return Ok(report);
        }
        report.dispatched = pending.len();

        let total = pending.len();
        let mut remaining: HashMap<String, DownloadTask> =
            pending.into_iter().map(|t| (t.key.clone(), t)).collect();
        let mut done = 0_usize;
        let mut attempt = 1_u32;

        loop {
            match self
                .run_attempt(&mut remaining, attempt, &mut done, total, &mut report)
                .await?
            {
                AttemptOutcome::Finished => break,
                AttemptOutcome::Stalled => {
                    attempt += 1;
                    report.restarts += 1;
                    self.events.publish(DownloadEvent::Restart { attempt });
                }
            }
        }

        self.events.publish(DownloadEvent::Done);
        Ok(report)
    }

    /// Complete what is already on disk; post-process verified files locally.
    async fn precheck(
        &self,
        tasks: Vec<DownloadTask>,
        report: &mut BatchReport,
    ) -> Vec<DownloadTask> {
        let mut pending = Vec::with_capacity(tasks.len());
        for task in tasks {
            let dest = task.destination();
            if task.dynamic && tokio::fs::try_exists(&dest).await.unwrap_or(false) {
                report.skipped += 1;
                continue;
            }
            if !is_valid(&dest, &task.chk).await {
                pending.push(task);
                continue;
            }
            if task.needs_post_processing() {
                if let Err(e) = post_process(&task).await {
                    warn!("Local post-processing of {} failed, queueing: {}", task.key, e);
                    pending.push(task);
                    continue;
                }
            }
            report.skipped += 1;
        }
        debug!("Pre-check: {} present, {} to fetch", report.skipped, pending.len());
        pending
    }

    async fn run_attempt(
        &self,
        remaining: &mut HashMap<String, DownloadTask>,
        attempt: u32,
        done: &mut usize,
        total: usize,
        report: &mut BatchReport,
    ) -> LauncherResult<AttemptOutcome> {
        let ordered = sort_by_size(remaining.values().cloned().collect());
        let partitions = partition(ordered, self.workers);
        self.events.publish(DownloadEvent::Setup {
            cores: self.workers,
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handles: Vec<WorkerHandle> = Vec::with_capacity(partitions.len());
        for part in partitions.into_iter().filter(|p| !p.is_empty()) {
            match self.launcher.spawn(part, tx.clone()).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    kill_all(&mut handles);
                    return Err(e);
                }
            }
        }
        drop(tx);
        self.events.publish(DownloadEvent::Start);

        let window = watchdog_window(self.watchdog_base, attempt);
        let mut deadline = Instant::now() + window;

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(WorkerMessage::Done { key }) => {
                        if remaining.remove(&key).is_none() {
                            continue;
                        }
                        *done += 1;
                        deadline = Instant::now() + window;
                        let left = remaining.len();
                        self.events.publish(DownloadEvent::Progress {
                            key,
                            done: *done,
                            total,
                            left,
                        });
                        if left == 0 {
                            kill_all(&mut handles);
                            return Ok(AttemptOutcome::Finished);
                        }
                    }
                    Some(WorkerMessage::Fail { key, kind, error }) => {
                        if !remaining.contains_key(&key) {
                            continue;
                        }
                        if kind == FailKind::Fail {
                            report.failed.push(key.clone());
                        }
                        self.events.publish(DownloadEvent::Fail { key, kind, error });
                    }
                    None => {
                        warn!("All workers exited with {} tasks outstanding", remaining.len());
                        kill_all(&mut handles);
                        let mut orphaned: Vec<&String> = remaining.keys().collect();
                        orphaned.sort();
                        for key in orphaned {
                            self.events.publish(DownloadEvent::Fail {
                                key: key.clone(),
                                kind: FailKind::System,
                                error: "worker exited without reporting".to_string(),
                            });
                        }
                        return Ok(AttemptOutcome::Stalled);
                    }
                },
                _ = sleep_until(deadline) => {
                    kill_all(&mut handles);
                    return Ok(AttemptOutcome::Stalled);
                }
            }
        }
    }
}

fn kill_all(handles: &mut [WorkerHandle]) {
    for handle in handles.iter_mut() {
        handle.kill();
    }
}

/// Largest first; unknown sizes count as largest. Stable for equal sizes.
fn sort_by_size(mut tasks: Vec<DownloadTask>) -> Vec<DownloadTask> {
    tasks.sort_by(|a, b| b.sort_weight().cmp(&a.sort_weight()));
    tasks
}

/// First occurrence of each key wins.
fn dedup_by_key(tasks: Vec<DownloadTask>) -> Vec<DownloadTask> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| seen.insert(t.key.clone()))
        .collect()
}

/// Round-robin split into `slots` partitions.
fn partition(tasks: Vec<DownloadTask>, slots: usize) -> Vec<Vec<DownloadTask>> {
    let slots = slots.max(1);
    let mut parts: Vec<Vec<DownloadTask>> = (0..slots).map(|_| Vec::new()).collect();
    for (i, task) in tasks.into_iter().enumerate() {
        parts[i % slots].push(task);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::task::Checksum;

    fn task(key: &str, size: Option<u64>) -> DownloadTask {
        DownloadTask::new(Path::new("/mc/x").join(key).as_path(), "u")
            .with_key(key)
            .with_checksum(Checksum::new(None, size))
    }

    #[test]
    fn unknown_sizes_sort_first_then_descending() {
        let sorted = sort_by_size(vec![task("a", Some(1)), task("b", None), task("c", Some(9))]);
        let keys: Vec<_> = sorted.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn first_key_wins_on_dedup() {
        let mut first = task("a", Some(1));
        first.url = "first".into();
        let deduped = dedup_by_key(vec![first, task("a", Some(1)), task("b", None)]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].url, "first");
    }

    #[test]
    fn round_robin_leaves_extra_slots_empty() {
        let parts = partition(vec![task("a", None), task("b", None), task("c", None)], 4);
        assert_eq!(parts.iter().map(Vec::len).collect::<Vec<_>>(), vec![1, 1, 1, 0]);
        let parts = partition((0..5).map(|i| task(&i.to_string(), None)).collect(), 2);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[1].len(), 2);
    }

    #[test]
    fn watchdog_window_escalates_linearly() {
        let base = Duration::from_millis(15_000);
        assert_eq!(watchdog_window(base, 1), Duration::from_millis(15_000));
        assert_eq!(watchdog_window(base, 3), Duration::from_millis(45_000));
    }
}
