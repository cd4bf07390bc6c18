use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "launchkit";
pub const SETTINGS_FILE: &str = "launcher_settings.json";

pub const DEFAULT_RESOURCES_URL: &str = "https://resources.download.minecraft.net";
pub const DEFAULT_LIBRARIES_URL: &str = "https://libraries.minecraft.net/";
pub const DEFAULT_WATCHDOG_MS: u64 = 15_000;
pub const DEFAULT_RETRIES: u32 = 3;

/// How the engine runs its workers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// One tokio task per partition.
    #[default]
    Task,
    /// One OS process per partition (`<exe> worker --tasks <file>`).
    Process,
}

/// Manifest families refreshed by `ManifestIndex::refresh`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFamily {
    Vanilla,
    Fabric,
    Quilt,
    Runtime,
}

/// User-editable settings persisted as `launcher_settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// `.minecraft`-style root every file lands under.
    pub root: PathBuf,
    /// Overrides the logical CPU count used for partitioning.
    pub workers: Option<usize>,
    pub worker_mode: WorkerMode,
    /// Watchdog window for the first attempt; attempt `n` waits `n` times this.
    pub watchdog_ms: u64,
    /// Extra attempts per task after the first failure.
    pub retries: u32,
    /// Default exclude patterns when extracting natives.
    pub natives_exclude: Vec<String>,
    pub resources_url: String,
    pub libraries_url: String,
    pub manifests: Vec<ManifestFamily>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            workers: None,
            worker_mode: WorkerMode::Task,
            watchdog_ms: DEFAULT_WATCHDOG_MS,
            retries: DEFAULT_RETRIES,
            natives_exclude: vec!["META-INF/".to_string()],
            resources_url: DEFAULT_RESOURCES_URL.to_string(),
            libraries_url: DEFAULT_LIBRARIES_URL.to_string(),
            manifests: vec![
                ManifestFamily::Vanilla,
                ManifestFamily::Fabric,
                ManifestFamily::Quilt,
                ManifestFamily::Runtime,
            ],
        }
    }
}

impl LauncherSettings {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing. A malformed file is an error rather than silently ignored.
    pub fn load(path: &Path) -> LauncherResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(LauncherError::io(path, e)),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| LauncherError::io(path, e))
    }

    /// Default location of the settings file.
    pub fn default_path() -> PathBuf {
        default_base_dir().join(SETTINGS_FILE)
    }

    /// Worker slots: the override, or the logical CPU count (at least 2).
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            Some(_) => {
                warn!("Ignoring workers = 0 in settings");
                logical_cpus()
            }
            None => logical_cpus(),
        }
    }
}

fn logical_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn default_root() -> PathBuf {
    default_base_dir().join(".minecraft")
}
