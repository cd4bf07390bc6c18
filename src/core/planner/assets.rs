// ─── Asset Planner ───
// Asset index → object download tasks, and the legacy copy pass that runs
// after the batch for `virtual` / `map_to_resources` indexes.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::downloader::{fetch_verified, Checksum, DownloadTask, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherContext;
use crate::core::version::AssetIndexInfo;

use super::safe_relative;

/// Icons old clients expect under `resources/` that newer indexes dropped.
const LEGACY_ICONS: [(&str, &str, u64); 3] = [
    ("icons/icon_16x16.png", "bdf48ef6b5d0d23bbb02e17d04865216179f510a", 3665),
    ("icons/icon_32x32.png", "92750c5f93c312ba9ab413d546f32190c56d6f1f", 5362),
    ("icons/minecraft.icns", "991b421dfd401f115241601b2b373140a8d78572", 114786),
];

/// Top-level asset index JSON structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AssetIndex {
    #[serde(default)]
    pub objects: BTreeMap<String, AssetObject>,
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore: bool,
}

impl AssetIndex {
    /// Directory under `assets/legacy` this index is mirrored into, if any.
    pub fn legacy_dir_name(&self) -> Option<&'static str> {
        if self.is_virtual {
            Some("virtual")
        } else if self.map_to_resources {
            Some("resources")
        } else {
            None
        }
    }

    /// Add the legacy icons (plain and under `minecraft/`) when absent.
    fn add_legacy_icons(&mut self) {
        for (name, hash, size) in LEGACY_ICONS {
            for key in [name.to_string(), format!("minecraft/{}", name)] {
                self.objects.entry(key).or_insert_with(|| AssetObject {
                    hash: hash.to_string(),
                    size,
                    ignore: false,
                });
            }
        }
    }
}

#[derive(Debug)]
pub struct AssetPlan {
    pub index: AssetIndex,
    pub tasks: Vec<DownloadTask>,
}

/// `assets/objects/<hash[..2]>/<hash>`
pub fn object_path(ctx: &LauncherContext, hash: &str) -> PathBuf {
    let prefix = hash.get(..2).unwrap_or(hash);
    ctx.assets_dir().join("objects").join(prefix).join(hash)
}

/// Fetch and verify the index, then plan one task per distinct object.
pub async fn plan_assets(
    ctx: &LauncherContext,
    info: &AssetIndexInfo,
    fetcher: &dyn Fetcher,
) -> LauncherResult<AssetPlan> {
    let index_path = ctx
        .assets_dir()
        .join("indexes")
        .join(format!("{}.json", info.id));
    fetch_verified(fetcher, &info.url, &index_path, &Checksum::new(info.sha1.clone(), info.size))
        .await?;

    let raw = tokio::fs::read_to_string(&index_path)
        .await
        .map_err(|e| LauncherError::io(&index_path, e))?;
    let mut index: AssetIndex = serde_json::from_str(&raw)?;
    if index.map_to_resources {
        index.add_legacy_icons();
    }

    let base = ctx.settings().resources_url.trim_end_matches('/').to_string();
    let mut seen_hashes = HashSet::new();
    let mut tasks = Vec::with_capacity(index.objects.len());
    for (name, object) in &index.objects {
        if object.ignore || !seen_hashes.insert(object.hash.clone()) {
            continue;
        }
        let prefix = object.hash.get(..2).unwrap_or(&object.hash);
        tasks.push(
            DownloadTask::new(
                &object_path(ctx, &object.hash),
                format!("{}/{}/{}", base, prefix, object.hash),
            )
            .with_key(name.clone())
            .with_checksum(Checksum::new(Some(object.hash.clone()), Some(object.size))),
        );
    }

    info!(
        "Asset index {}: {} objects, {} distinct downloads",
        info.id,
        index.objects.len(),
        tasks.len()
    );
    Ok(AssetPlan { index, tasks })
}

/// Copy every object to `assets/legacy/<virtual|resources>/<name>`.
///
/// Runs after the object batch; missing objects and unsafe names are
/// skipped with a warning. Returns the number of files copied.
pub async fn copy_legacy_assets(
    ctx: &LauncherContext,
    index: &AssetIndex,
) -> LauncherResult<usize> {
    let Some(dir_name) = index.legacy_dir_name() else {
        return Ok(0);
    };
    let legacy_root = ctx.assets_dir().join("legacy").join(dir_name);

    let mut copied = 0;
    for (name, object) in &index.objects {
        let Some(relative) = safe_relative(name) else {
            warn!("Skipping unsafe asset name '{}'", name);
            continue;
        };
        let source = object_path(ctx, &object.hash);
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            warn!("Asset {} missing from the object store, not copied", name);
            continue;
        }
        let dest = legacy_root.join(relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| LauncherError::io(&dest, e))?;
        copied += 1;
    }

    debug!("Copied {} legacy assets into {:?}", copied, legacy_root);
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::{sha1_file, testing::MemoryFetcher};
    use crate::core::state::LauncherSettings;
    use crate::core::version::PlatformContext;

    fn context(name: &str) -> LauncherContext {
        let root = std::env::temp_dir().join(format!("launchkit-assets-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        LauncherContext::with_platform(
            LauncherSettings {
                root,
                ..LauncherSettings::default()
            },
            PlatformContext::new("linux", "x64", ""),
        )
    }

    async fn served_index(fetcher: &MemoryFetcher, body: &str, dir: &Path) -> AssetIndexInfo {
        let probe = dir.join("probe.json");
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(&probe, body).unwrap();
        let sha1 = sha1_file(&probe).await.unwrap();
        fetcher.serve("https://example.com/index.json", body);
        AssetIndexInfo {
            id: "legacy".into(),
            url: "https://example.com/index.json".into(),
            sha1: Some(sha1),
            size: Some(body.len() as u64),
            total_size: None,
        }
    }

    #[tokio::test]
    async fn objects_become_hash_addressed_tasks() {
        let ctx = context("plan");
        let fetcher = MemoryFetcher::new();
        let body = r#"{"objects":{
            "minecraft/sounds/a.ogg":{"hash":"abcdef0000000000000000000000000000000000","size":3},
            "minecraft/sounds/b.ogg":{"hash":"abcdef0000000000000000000000000000000000","size":3},
            "minecraft/lang/en.json":{"hash":"1234560000000000000000000000000000000000","size":7}
        }}"#;
        let info = served_index(&fetcher, body, ctx.root()).await;

        let plan = plan_assets(&ctx, &info, &fetcher).await.unwrap();
        assert_eq!(plan.tasks.len(), 2);
        let lang = plan.tasks.iter().find(|t| t.key == "minecraft/lang/en.json").unwrap();
        assert_eq!(
            lang.url,
            "https://resources.download.minecraft.net/12/1234560000000000000000000000000000000000"
        );
        assert_eq!(lang.destination(), object_path(&ctx, "1234560000000000000000000000000000000000"));
        assert!(ctx.assets_dir().join("indexes").join("legacy.json").exists());
        let _ = std::fs::remove_dir_all(ctx.root());
    }

    #[tokio::test]
    async fn map_to_resources_adds_icons() {
        let ctx = context("icons");
        let fetcher = MemoryFetcher::new();
        let info = served_index(&fetcher, r#"{"map_to_resources":true,"objects":{}}"#, ctx.root()).await;
        let plan = plan_assets(&ctx, &info, &fetcher).await.unwrap();
        assert_eq!(plan.index.objects.len(), 6);
        assert!(plan.index.objects.contains_key("minecraft/icons/minecraft.icns"));
        // Three distinct hashes.
        assert_eq!(plan.tasks.len(), 3);
        let _ = std::fs::remove_dir_all(ctx.root());
    }

    #[tokio::test]
    async fn legacy_copy_skips_missing_and_unsafe_names() {
        let ctx = context("legacy");
        let hash = "ffee000000000000000000000000000000000000";
        let object = object_path(&ctx, hash);
        std::fs::create_dir_all(object.parent().unwrap()).unwrap();
        std::fs::write(&object, "ogg").unwrap();

        let mut index = AssetIndex {
            is_virtual: true,
            ..AssetIndex::default()
        };
        let entry = |h: &str| AssetObject { hash: h.into(), size: 3, ignore: false };
        index.objects.insert("sounds/step.ogg".into(), entry(hash));
        index.objects.insert("../escape.ogg".into(), entry(hash));
        index.objects.insert("sounds/missing.ogg".into(), entry("0000000000000000000000000000000000000000"));

        let copied = copy_legacy_assets(&ctx, &index).await.unwrap();
        assert_eq!(copied, 1);
        let copy = ctx.assets_dir().join("legacy").join("virtual").join("sounds").join("step.ogg");
        assert_eq!(std::fs::read_to_string(copy).unwrap(), "ogg");
        assert!(object.exists());
        let _ = std::fs::remove_dir_all(ctx.root());
    }
}
