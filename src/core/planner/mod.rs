// ─── Download Planners ───
// Resolved descriptor → `DownloadTask` lists for the engine.

use std::path::{Component, Path, PathBuf};

pub mod assets;
pub mod client;
pub mod libraries;
pub mod runtime;

pub use assets::{copy_legacy_assets, plan_assets, AssetIndex, AssetObject, AssetPlan};
pub use client::{client_jar_path, plan_client};
pub use libraries::{plan_libraries, ClasspathIndex, LibraryPlan};
pub use runtime::{plan_runtime, plan_runtime_manifest, runtime_dir, RuntimeManifest};

/// Relative path made only of normal components, for names taken from
/// remote indexes.
pub(crate) fn safe_relative(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if name.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(path.to_path_buf())
}
