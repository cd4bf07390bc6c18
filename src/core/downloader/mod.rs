mod client;
mod engine;
mod extract;
mod integrity;
mod launcher;
mod task;
pub mod testing;
mod worker;

pub use client::{Fetcher, HttpFetcher};
pub use engine::{watchdog_window, BatchReport, DownloadEngine};
pub use extract::{decompress_lzma, extract_zip, make_executable, post_process};
pub use integrity::{check_file, fetch_verified, is_valid, sha1_file};
pub use launcher::{ProcessLauncher, TaskLauncher, WorkerHandle, WorkerLauncher};
pub use task::{path_segments, ArchiveKind, Checksum, DownloadTask, Sha1Spec, Unzip};
pub use worker::{run_partition, run_worker_process, WorkerMessage, WorkerPartition};
