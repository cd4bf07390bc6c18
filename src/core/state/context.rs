use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::version::PlatformContext;

use super::settings::{LauncherSettings, WorkerMode};

/// Immutable configuration handed to the resolver, the planners and the engine.
///
/// Built once from [`LauncherSettings`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct LauncherContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    root: PathBuf,
    platform: PlatformContext,
    settings: LauncherSettings,
}

impl LauncherContext {
    pub fn from_settings(settings: LauncherSettings) -> Self {
        Self::with_platform(settings, PlatformContext::current())
    }

    pub fn with_platform(settings: LauncherSettings, platform: PlatformContext) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                root: settings.root.clone(),
                platform,
                settings,
            }),
        }
    }

    /// Convenience constructor for a root with default settings.
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        let settings = LauncherSettings {
            root: root.into(),
            ..LauncherSettings::default()
        };
        Self::from_settings(settings)
    }

    pub fn settings(&self) -> &LauncherSettings {
        &self.inner.settings
    }

    pub fn platform(&self) -> &PlatformContext {
        &self.inner.platform
    }

    pub fn worker_mode(&self) -> WorkerMode {
        self.inner.settings.worker_mode
    }

    pub fn watchdog_base(&self) -> Duration {
        Duration::from_millis(self.inner.settings.watchdog_ms)
    }

    // ── Directory layout ────────────────────────────────

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.inner.root.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.inner.root.join("assets")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.inner.root.join("versions")
    }

    pub fn runtimes_dir(&self) -> PathBuf {
        self.inner.root.join("runtimes")
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.inner.root.join("natives")
    }

    /// Launcher-private metadata (`manifests/`, `index/`, `runtimes/`, `lzma/`).
    pub fn meta_dir(&self) -> PathBuf {
        self.inner.root.join("launcher")
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.meta_dir().join("manifests")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.meta_dir().join("index")
    }

    pub fn runtime_manifests_dir(&self) -> PathBuf {
        self.meta_dir().join("runtimes")
    }

    pub fn lzma_dir(&self) -> PathBuf {
        self.meta_dir().join("lzma")
    }
}
