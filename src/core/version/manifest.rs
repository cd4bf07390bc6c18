// ─── Version Manifest ───
// Lookup of manifest entries across every index file under `launcher/manifests`,
// and the refresh that rebuilds those files from the upstream metadata services.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::downloader::{fetch_verified, Checksum, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::{LauncherContext, ManifestFamily};

use super::rules::PlatformContext;

const VANILLA_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest_v2.json";
const RUNTIME_INDEX_URL: &str = "https://launchermeta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json";

const FABRIC_LOADER_URL: &str = "https://meta.fabricmc.net/v2/versions/loader/";
const FABRIC_GAME_URL: &str = "https://meta.fabricmc.net/v2/versions/game/";
const QUILT_LOADER_URL: &str = "https://meta.quiltmc.org/v3/versions/loader";
const QUILT_GAME_URL: &str = "https://meta.quiltmc.org/v3/versions/game";

/// Type given to ids no manifest knows about.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Pointer to a version descriptor document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    #[serde(rename = "type", default = "unknown_type")]
    pub version_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    /// Version this entry inherits from and shares a folder with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable: Option<bool>,
}

fn unknown_type() -> String {
    UNKNOWN_TYPE.to_string()
}

impl ManifestEntry {
    /// Placeholder for an id absent from every manifest.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.trim().to_string(),
            version_type: unknown_type(),
            url: None,
            sha1: None,
            base: None,
            release_time: None,
            stable: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.version_type == UNKNOWN_TYPE
    }

    /// Folder under `versions/` the descriptor is stored in.
    pub fn folder(&self) -> &str {
        self.base.as_deref().unwrap_or(&self.id)
    }
}

/// `{version, stable}` rows of the fabric/quilt game and loader indexes.
#[derive(Debug, Deserialize)]
struct MetaVersion {
    version: String,
    #[serde(default)]
    stable: bool,
}

#[derive(Debug, Deserialize)]
struct VanillaManifest {
    latest: Value,
    versions: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct RuntimeIndexEntry {
    manifest: RuntimeManifestRef,
}

#[derive(Debug, Deserialize)]
struct RuntimeManifestRef {
    url: String,
    sha1: Option<String>,
    size: Option<u64>,
}

/// View over the manifest index files of one launcher root.
#[derive(Debug, Clone)]
pub struct ManifestIndex {
    ctx: LauncherContext,
}

impl ManifestIndex {
    pub fn new(ctx: LauncherContext) -> Self {
        Self { ctx }
    }

    /// Every entry in every manifest file, files visited in name order.
    /// Unreadable files are skipped with a warning.
    pub async fn entries(&self) -> LauncherResult<Vec<ManifestEntry>> {
        let dir = self.ctx.manifests_dir();
        let mut files = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LauncherError::io(&dir, e)),
        };
        while let Some(item) = read_dir
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&dir, e))?
        {
            let path = item.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut entries = Vec::new();
        for path in files {
            match read_manifest_file(&path).await {
                Ok(mut found) => entries.append(&mut found),
                Err(e) => warn!("Skipping unreadable manifest {:?}: {}", path, e),
            }
        }
        Ok(entries)
    }

    /// Case-insensitive, trimmed lookup. Absent ids yield
    /// [`ManifestEntry::unknown`] rather than an error.
    pub async fn find(&self, id: &str) -> LauncherResult<ManifestEntry> {
        let wanted = id.trim().to_lowercase();
        let found = self
            .entries()
            .await?
            .into_iter()
            .find(|entry| entry.id.trim().to_lowercase() == wanted);
        Ok(found.unwrap_or_else(|| {
            debug!("No manifest entry for '{}'", id);
            ManifestEntry::unknown(id)
        }))
    }

    /// Rebuild the manifest index files for every configured family.
    ///
    /// Vanilla and runtime failures are returned; loader families are optional
    /// and only logged.
    pub async fn refresh(&self, fetcher: &dyn Fetcher) -> LauncherResult<()> {
        let families = self.ctx.settings().manifests.clone();
        info!("Refreshing manifests: {:?}", families);

        for family in families {
            match family {
                ManifestFamily::Vanilla => self.refresh_vanilla(fetcher).await?,
                ManifestFamily::Fabric => {
                    if let Err(e) = self
                        .refresh_loader(fetcher, "fabric", FABRIC_GAME_URL, FABRIC_LOADER_URL, "")
                        .await
                    {
                        warn!("Fabric manifest refresh failed: {}", e);
                    }
                }
                ManifestFamily::Quilt => {
                    if let Err(e) = self
                        .refresh_loader(fetcher, "quilt", QUILT_GAME_URL, QUILT_LOADER_URL, "/")
                        .await
                    {
                        warn!("Quilt manifest refresh failed: {}", e);
                    }
                }
                ManifestFamily::Runtime => self.refresh_runtimes(fetcher).await?,
            }
        }
        Ok(())
    }

    async fn refresh_vanilla(&self, fetcher: &dyn Fetcher) -> LauncherResult<()> {
        let text = fetcher.fetch_text(VANILLA_MANIFEST_URL).await?;
        let manifest: VanillaManifest = serde_json::from_str(&text)?;
        info!("Loaded {} vanilla versions", manifest.versions.len());

        write_json(&self.ctx.index_dir().join("latest.json"), &manifest.latest).await?;
        write_json(&self.ctx.manifests_dir().join("vanilla.json"), &manifest.versions).await
    }

    /// One entry per (game version, loader version) pair.
    async fn refresh_loader(
        &self,
        fetcher: &dyn Fetcher,
        family: &str,
        game_url: &str,
        loader_url: &str,
        separator: &str,
    ) -> LauncherResult<()> {
        let index_dir = self.ctx.index_dir();
        let games: Vec<MetaVersion> = fetch_index(
            fetcher,
            game_url,
            &index_dir,
            &format!("{}_game.json", family),
        )
        .await?;
        let loaders: Vec<MetaVersion> = fetch_index(
            fetcher,
            loader_url,
            &index_dir,
            &format!("{}_loader.json", family),
        )
        .await?;

        let entries = loader_entries(family, &games, &loaders, loader_url, separator);
        info!("Generated {} {} manifest entries", entries.len(), family);
        write_json(&self.ctx.manifests_dir().join(format!("{}.json", family)), &entries).await
    }

    async fn refresh_runtimes(&self, fetcher: &dyn Fetcher) -> LauncherResult<()> {
        let text = fetcher.fetch_text(RUNTIME_INDEX_URL).await?;
        let index_path = self.ctx.index_dir().join("runtime.json");
        write_text(&index_path, &text).await?;

        let index: HashMap<String, HashMap<String, Vec<RuntimeIndexEntry>>> =
            serde_json::from_str(&text)?;
        let Some(key) = runtime_platform_key(self.ctx.platform()) else {
            warn!("No runtime platform key for {:?}", self.ctx.platform());
            return Ok(());
        };
        let Some(components) = index.get(key) else {
            warn!("Runtime index has no entry for platform '{}'", key);
            return Ok(());
        };

        let dir = self.ctx.runtime_manifests_dir();
        for (component, builds) in components {
            let Some(first) = builds.first() else {
                continue;
            };
            let chk = Checksum::new(first.manifest.sha1.clone(), first.manifest.size);
            let dest = dir.join(format!("{}.json", component));
            fetch_verified(fetcher, &first.manifest.url, &dest, &chk).await?;
            debug!("Runtime manifest ready: {}", component);
        }
        Ok(())
    }
}

/// Build `<family>-loader-<loader>-<game>` entries based on `<game>`.
fn loader_entries(
    family: &str,
    games: &[MetaVersion],
    loaders: &[MetaVersion],
    loader_url: &str,
    separator: &str,
) -> Vec<ManifestEntry> {
    let mut entries = Vec::with_capacity(games.len() * loaders.len());
    for game in games {
        for loader in loaders {
            entries.push(ManifestEntry {
                id: format!("{}-loader-{}-{}", family, loader.version, game.version),
                version_type: family.to_string(),
                url: Some(format!(
                    "{}{}{}/{}/profile/json",
                    loader_url, separator, game.version, loader.version
                )),
                sha1: None,
                base: Some(game.version.clone()),
                release_time: None,
                stable: Some(loader.stable),
            });
        }
    }
    entries
}

/// Key of the host platform in the runtime index.
pub fn runtime_platform_key(platform: &PlatformContext) -> Option<&'static str> {
    match (platform.os.as_str(), platform.arch.as_str()) {
        ("windows", "x64") => Some("windows-x64"),
        ("windows", "arm64") => Some("windows-arm64"),
        ("windows", _) => Some("windows-x86"),
        ("linux", "x64") => Some("linux"),
        ("linux", "arm64") => Some("linux-arm64"),
        ("linux", "x86") => Some("linux-i386"),
        ("osx", "arm64") => Some("mac-os-arm64"),
        ("osx", _) => Some("mac-os"),
        _ => None,
    }
}

async fn read_manifest_file(path: &Path) -> LauncherResult<Vec<ManifestEntry>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    let value: Value = serde_json::from_str(&raw)?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

async fn fetch_index<T: serde::de::DeserializeOwned>(
    fetcher: &dyn Fetcher,
    url: &str,
    dir: &Path,
    name: &str,
) -> LauncherResult<T> {
    let text = fetcher.fetch_text(url).await?;
    write_text(&dir.join(name), &text).await?;
    Ok(serde_json::from_str(&text)?)
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> LauncherResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_text(path, &json).await
}

async fn write_text(path: &Path, text: &str) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    tokio::fs::write(path, text)
        .await
        .map_err(|e| LauncherError::io(path, e))
}
