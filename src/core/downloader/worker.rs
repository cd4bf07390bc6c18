// ─── Download Worker ───
// Runs one partition of a batch sequentially and reports back over a channel.
// The same loop backs in-process task workers and `launchkit worker` processes.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::client::{Fetcher, HttpFetcher};
use super::extract::post_process;
use super::integrity::{check_file, is_valid};
use super::task::DownloadTask;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::FailKind;

/// Message from a worker to the supervisor, keyed by task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// The task is finished, successfully or after exhausting retries.
    Done { key: String },
    Fail {
        key: String,
        kind: FailKind,
        error: String,
    },
}

/// Partition file handed to a worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPartition {
    pub retries: u32,
    pub tasks: Vec<DownloadTask>,
}

/// Process every task in order. Returns once all tasks reported `Done`
/// or the supervisor hung up.
pub async fn run_partition(
    tasks: Vec<DownloadTask>,
    fetcher: Arc<dyn Fetcher>,
    retries: u32,
    tx: mpsc::UnboundedSender<WorkerMessage>,
) {
    for task in tasks {
        let key = task.key.clone();
        run_task(&task, fetcher.as_ref(), retries, &tx).await;
        if tx.send(WorkerMessage::Done { key }).is_err() {
            debug!("Supervisor went away, stopping worker");
            return;
        }
    }
}

async fn run_task(
    task: &DownloadTask,
    fetcher: &dyn Fetcher,
    retries: u32,
    tx: &mpsc::UnboundedSender<WorkerMessage>,
) {
    let dest = task.destination();
    if task.dynamic && tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        return;
    }

    let mut attempt = 0_u32;
    loop {
        match attempt_task(task, fetcher).await {
            Ok(()) => return,
            Err(e) if attempt < retries => {
                attempt += 1;
                let _ = tx.send(WorkerMessage::Fail {
                    key: task.key.clone(),
                    kind: FailKind::Retry,
                    error: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Giving up on {} after {} attempts", task.key, attempt + 1);
                let _ = tx.send(WorkerMessage::Fail {
                    key: task.key.clone(),
                    kind: FailKind::Fail,
                    error: e.to_string(),
                });
                return;
            }
        }
    }
}

async fn attempt_task(task: &DownloadTask, fetcher: &dyn Fetcher) -> LauncherResult<()> {
    let dest = task.destination();
    if is_valid(&dest, &task.chk).await {
        debug!("Already valid: {:?}", dest);
    } else {
        fetcher.fetch_to_file(&task.url, &dest).await?;
        if !check_file(&dest, &task.chk).await? {
            return Err(LauncherError::Other(format!("{:?} missing after download", dest)));
        }
    }
    post_process(task).await
}

/// Entry point of `launchkit worker --tasks <file>`.
///
/// Messages are written to stdout as JSON lines; logs must go elsewhere.
pub async fn run_worker_process(tasks_file: &Path) -> LauncherResult<()> {
    let raw = tokio::fs::read_to_string(tasks_file)
        .await
        .map_err(|e| LauncherError::io(tasks_file, e))?;
    let partition: WorkerPartition = serde_json::from_str(&raw)?;
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let work = tokio::spawn(run_partition(partition.tasks, fetcher, partition.retries, tx));

    let mut stdout = tokio::io::stdout();
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        stdout
            .write_all(&line)
            .await
            .map_err(|e| LauncherError::Worker(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| LauncherError::Worker(e.to_string()))?;
    }

    work.await
        .map_err(|e| LauncherError::Worker(format!("worker loop panicked: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::task::Checksum;
    use crate::core::downloader::testing::MemoryFetcher;

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("launchkit-worker-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<WorkerMessage>) -> Vec<WorkerMessage> {
        let mut out = Vec::new();
        while let Some(m) = rx.recv().await {
            out.push(m);
        }
        out
    }

    #[test]
    fn messages_serialize_as_tagged_json() {
        let line = serde_json::to_string(&WorkerMessage::Done { key: "a".into() }).unwrap();
        assert_eq!(line, r#"{"type":"done","key":"a"}"#);
        let fail: WorkerMessage =
            serde_json::from_str(r#"{"type":"fail","key":"b","kind":"retry","error":"503"}"#).unwrap();
        assert!(matches!(fail, WorkerMessage::Fail { kind: FailKind::Retry, .. }));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let dir = scratch("retry");
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.serve("https://example.com/a", "hello");
        fetcher.fail_times("https://example.com/a", 2);

        let task = DownloadTask::new(&dir.join("a.txt"), "https://example.com/a")
            .with_checksum(Checksum::new(Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d".into()), Some(5)));
        let (tx, rx) = mpsc::unbounded_channel();
        run_partition(vec![task], fetcher.clone(), 3, tx).await;

        let messages = collect(rx).await;
        let retries = messages
            .iter()
            .filter(|m| matches!(m, WorkerMessage::Fail { kind: FailKind::Retry, .. }))
            .count();
        assert_eq!(retries, 2);
        assert!(matches!(messages.last(), Some(WorkerMessage::Done { .. })));
        assert_eq!(fetcher.calls(), 3);
        assert!(dir.join("a.txt").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn exhausted_retries_still_report_done() {
        let dir = scratch("exhaust");
        let fetcher = Arc::new(MemoryFetcher::new());
        let task = DownloadTask::new(&dir.join("gone.bin"), "https://example.com/gone");
        let (tx, rx) = mpsc::unbounded_channel();
        run_partition(vec![task], fetcher.clone(), 3, tx).await;

        let messages = collect(rx).await;
        assert_eq!(messages.len(), 5);
        assert!(matches!(messages[3], WorkerMessage::Fail { kind: FailKind::Fail, .. }));
        assert!(matches!(messages[4], WorkerMessage::Done { .. }));
        assert_eq!(fetcher.calls(), 4);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn corrupt_download_counts_as_failure() {
        let dir = scratch("corrupt");
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.serve("https://example.com/c", "not what you expected");
        let task = DownloadTask::new(&dir.join("c.bin"), "https://example.com/c")
            .with_checksum(Checksum::new(Some("0".repeat(40)), None));
        let (tx, rx) = mpsc::unbounded_channel();
        run_partition(vec![task], fetcher, 0, tx).await;

        let messages = collect(rx).await;
        assert!(matches!(
            &messages[0],
            WorkerMessage::Fail { kind: FailKind::Fail, error, .. } if error.contains("SHA-1")
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn dynamic_existing_file_is_left_alone() {
        let dir = scratch("dynamic");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("options.txt"), "user edits").unwrap();
        let fetcher = Arc::new(MemoryFetcher::new());
        let task = DownloadTask::new(&dir.join("options.txt"), "https://example.com/opts")
            .with_checksum(Checksum::new(Some("0".repeat(40)), None))
            .dynamic(true);
        let (tx, rx) = mpsc::unbounded_channel();
        run_partition(vec![task], fetcher.clone(), 3, tx).await;

        assert_eq!(collect(rx).await.len(), 1);
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(std::fs::read_to_string(dir.join("options.txt")).unwrap(), "user edits");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
