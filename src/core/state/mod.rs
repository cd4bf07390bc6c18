mod context;
mod settings;

pub use context::LauncherContext;
pub use settings::{
    LauncherSettings, ManifestFamily, WorkerMode, DEFAULT_LIBRARIES_URL, DEFAULT_RESOURCES_URL,
    DEFAULT_RETRIES, DEFAULT_WATCHDOG_MS, SETTINGS_FILE,
};
