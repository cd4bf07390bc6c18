// ─── Worker Launchers ───
// How a partition becomes a running worker: a tokio task in this process, or
// a child `launchkit worker` process speaking JSON lines on stdout.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::client::Fetcher;
use super::task::DownloadTask;
use super::worker::{run_partition, WorkerMessage, WorkerPartition};
use crate::core::error::{LauncherError, LauncherResult};

/// A running worker the supervisor can kill.
#[derive(Debug)]
pub struct WorkerHandle {
    task: JoinHandle<()>,
    child: Option<Child>,
}

impl WorkerHandle {
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task, child: None }
    }

    pub fn kill(&mut self) {
        self.task.abort();
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                debug!("Worker process already gone: {}", e);
            }
        }
    }
}

/// Starts one worker for one partition. Workers report only through `tx`;
/// dropping every sender tells the supervisor they have all exited.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn spawn(
        &self,
        partition: Vec<DownloadTask>,
        tx: mpsc::UnboundedSender<WorkerMessage>,
    ) -> LauncherResult<WorkerHandle>;
}

/// In-process workers on the tokio runtime.
pub struct TaskLauncher {
    fetcher: Arc<dyn Fetcher>,
    retries: u32,
}

impl TaskLauncher {
    pub fn new(fetcher: Arc<dyn Fetcher>, retries: u32) -> Self {
        Self { fetcher, retries }
    }
}

#[async_trait]
impl WorkerLauncher for TaskLauncher {
    async fn spawn(
        &self,
        partition: Vec<DownloadTask>,
        tx: mpsc::UnboundedSender<WorkerMessage>,
    ) -> LauncherResult<WorkerHandle> {
        let task = tokio::spawn(run_partition(
            partition,
            self.fetcher.clone(),
            self.retries,
            tx,
        ));
        Ok(WorkerHandle::from_task(task))
    }
}

/// One OS process per partition. A crashing worker only loses its own
/// partition; the supervisor sees its stdout close.
pub struct ProcessLauncher {
    program: PathBuf,
    retries: u32,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, retries: u32) -> Self {
        Self { program, retries }
    }

    /// Re-invoke the running executable.
    pub fn current_exe(retries: u32) -> LauncherResult<Self> {
        let program = std::env::current_exe().map_err(|e| LauncherError::io("current_exe", e))?;
        Ok(Self::new(program, retries))
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn spawn(
        &self,
        partition: Vec<DownloadTask>,
        tx: mpsc::UnboundedSender<WorkerMessage>,
    ) -> LauncherResult<WorkerHandle> {
        let file = tempfile::Builder::new()
            .prefix("launchkit-partition-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| LauncherError::io(std::env::temp_dir(), e))?;
        serde_json::to_writer(
            file.as_file(),
            &WorkerPartition {
                retries: self.retries,
                tasks: partition,
            },
        )?;
        let partition_path = file.into_temp_path();

        let mut child = Command::new(&self.program)
            .arg("worker")
            .arg("--tasks")
            .arg(&partition_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LauncherError::Worker(format!("failed to spawn {:?}: {}", self.program, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LauncherError::Worker("worker stdout not captured".into()))?;

        let pump = tokio::spawn(async move {
            // Removed once the worker has finished with it.
            let _partition_path = partition_path;
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match serde_json::from_str::<WorkerMessage>(&line) {
                        Ok(message) => {
                            if tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(_) => debug!("worker: {}", line),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Lost worker output: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(WorkerHandle {
            task: pump,
            child: Some(child),
        })
    }
}
