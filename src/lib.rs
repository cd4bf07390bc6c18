pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::downloader::{BatchReport, DownloadEngine, DownloadTask, Fetcher, HttpFetcher};
pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::events::{DownloadEvent, EventBus, FailKind};
pub use crate::core::install::{InstallResult, VersionInstaller};
pub use crate::core::state::{LauncherContext, LauncherSettings};
pub use crate::core::version::{ManifestResolver, PlatformContext, VersionDescriptor};

/// Initialize structured logging. Logs go to stderr so process workers can
/// keep stdout for their message stream.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launchkit=debug")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
