// ─── Runtime Planner ───
// Mojang runtime manifests (`{files: {path → entry}}`) → directories and
// links created eagerly, plus download tasks for the files.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::downloader::{is_valid, Checksum, DownloadTask, Unzip};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherContext;

use super::safe_relative;

#[derive(Debug, Deserialize)]
pub struct RuntimeManifest {
    pub files: BTreeMap<String, RuntimeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuntimeEntry {
    Directory,
    File {
        #[serde(default)]
        executable: bool,
        downloads: RuntimeDownloads,
    },
    Link {
        target: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct RuntimeDownloads {
    pub raw: RuntimeBlob,
    #[serde(default)]
    pub lzma: Option<RuntimeBlob>,
}

#[derive(Debug, Deserialize)]
pub struct RuntimeBlob {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

/// `runtimes/<component>`
pub fn runtime_dir(ctx: &LauncherContext, component: &str) -> PathBuf {
    ctx.runtimes_dir().join(component)
}

/// Load the stored manifest for `component` and plan it.
pub async fn plan_runtime(
    ctx: &LauncherContext,
    component: &str,
) -> LauncherResult<Vec<DownloadTask>> {
    let path = ctx.runtime_manifests_dir().join(format!("{}.json", component));
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LauncherError::Other(format!(
                "No runtime manifest for '{}' on this platform; refresh the manifests first",
                component
            )));
        }
        Err(e) => return Err(LauncherError::io(&path, e)),
    };
    let manifest: RuntimeManifest = serde_json::from_str(&raw)?;
    plan_runtime_manifest(ctx, component, &manifest).await
}

/// Plan every entry of `manifest`.
///
/// The whole manifest is validated before anything touches the disk: a link
/// whose target leaves the runtime directory, or any entry nested beneath a
/// link, fails the plan with `PathTraversal`.
pub async fn plan_runtime_manifest(
    ctx: &LauncherContext,
    component: &str,
    manifest: &RuntimeManifest,
) -> LauncherResult<Vec<DownloadTask>> {
    let root = runtime_dir(ctx, component);
    let entries = validated_entries(component, manifest)?;
    let mut tasks = Vec::new();

    for (name, relative, entry) in entries {
        let target = root.join(&relative);

        match entry {
            RuntimeEntry::Directory => {
                tokio::fs::create_dir_all(&target)
                    .await
                    .map_err(|e| LauncherError::io(&target, e))?;
            }
            RuntimeEntry::Link { target: link_to } => create_link(&target, link_to).await?,
            RuntimeEntry::File {
                executable,
                downloads,
            } => {
                let key = format!("{}/{}", component, name);
                if let Some(task) = file_task(ctx, &key, &target, *executable, downloads).await {
                    tasks.push(task);
                }
            }
        }
    }

    info!("Runtime {}: {} files to check", component, tasks.len());
    Ok(tasks)
}

async fn file_task(
    ctx: &LauncherContext,
    key: &str,
    target: &Path,
    executable: bool,
    downloads: &RuntimeDownloads,
) -> Option<DownloadTask> {
    let raw_chk = Checksum::new(Some(downloads.raw.sha1.clone()), Some(downloads.raw.size));
    let file_name = target.file_name()?.to_string_lossy().to_string();

    let Some(lzma) = &downloads.lzma else {
        return Some(
            DownloadTask::new(target, downloads.raw.url.clone())
                .with_key(key)
                .with_checksum(raw_chk)
                .executable(executable),
        );
    };

    // The compressed blob is transient; a verified output needs no task.
    if is_valid(target, &raw_chk).await {
        debug!("Runtime file {} already unpacked", key);
        return None;
    }
    let prefix = lzma.sha1.get(..2).unwrap_or(&lzma.sha1);
    let blob = ctx
        .lzma_dir()
        .join(prefix)
        .join(&lzma.sha1)
        .join(format!("{}.xz", file_name));
    let final_dir = target.parent()?;
    Some(
        DownloadTask::new(&blob, lzma.url.clone())
            .with_key(key)
            .with_checksum(Checksum::new(Some(lzma.sha1.clone()), Some(lzma.size)))
            .with_unzip(Unzip::lzma(final_dir, file_name))
            .executable(executable),
    )
}

fn validated_entries<'a>(
    component: &str,
    manifest: &'a RuntimeManifest,
) -> LauncherResult<Vec<(&'a str, PathBuf, &'a RuntimeEntry)>> {
    let mut entries = Vec::with_capacity(manifest.files.len());
    for (name, entry) in &manifest.files {
        match safe_relative(name) {
            Some(relative) => entries.push((name.as_str(), relative, entry)),
            None => warn!("Skipping unsafe runtime path '{}'", name),
        }
    }

    let links: HashSet<&Path> = entries
        .iter()
        .filter(|(_, _, entry)| matches!(entry, RuntimeEntry::Link { .. }))
        .map(|(_, relative, _)| relative.as_path())
        .collect();

    for (name, relative, entry) in &entries {
        let rejected = || LauncherError::PathTraversal(format!("{}/{}", component, name));
        if relative.ancestors().skip(1).any(|dir| links.contains(dir)) {
            warn!("Runtime entry '{}' lies beneath a link", name);
            return Err(rejected());
        }
        if let RuntimeEntry::Link { target } = entry {
            if link_destination(relative, target).is_none() {
                warn!("Runtime link '{}' points outside the runtime: {}", name, target);
                return Err(rejected());
            }
        }
    }
    Ok(entries)
}

/// Lexically resolve `target` against the directory holding `link`, both
/// relative to the runtime directory. `None` when the result escapes it.
fn link_destination(link: &Path, target: &str) -> Option<PathBuf> {
    let mut resolved = link.parent().map(Path::to_path_buf).unwrap_or_default();
    for component in Path::new(target).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

#[cfg(unix)]
async fn create_link(link: &Path, target: &str) -> LauncherResult<()> {
    if let Some(parent) = link.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    if tokio::fs::symlink_metadata(link).await.is_ok() {
        tokio::fs::remove_file(link)
            .await
            .map_err(|e| LauncherError::io(link, e))?;
    }
    tokio::fs::symlink(target, link)
        .await
        .map_err(|e| LauncherError::io(link, e))
}

#[cfg(not(unix))]
async fn create_link(link: &Path, _target: &str) -> LauncherResult<()> {
    debug!("Not creating runtime link {:?} on this platform", link);
    Ok(())
}
