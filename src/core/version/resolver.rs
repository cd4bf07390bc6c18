// ─── Manifest Resolver ───
// Turns a version id into a merged descriptor, following `inheritsFrom`
// chains and caching every link.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::downloader::{check_file, is_valid, Checksum, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherContext;

use super::manifest::{ManifestEntry, ManifestIndex};
use super::merge::merge_descriptors;
use super::version_file::VersionDescriptor;

#[derive(Debug, Clone)]
struct Resolved {
    /// Merged document, kept for children that inherit from it.
    raw: Arc<Value>,
    descriptor: Arc<VersionDescriptor>,
}

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = LauncherResult<Resolved>> + Send + 'a>>;

/// Resolves version ids for one launcher root. Results are cached for the
/// lifetime of the resolver, keyed by lowercase id.
pub struct ManifestResolver {
    ctx: LauncherContext,
    index: ManifestIndex,
    fetcher: Arc<dyn Fetcher>,
    cache: Mutex<HashMap<String, Resolved>>,
}

impl ManifestResolver {
    pub fn new(ctx: LauncherContext, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            index: ManifestIndex::new(ctx.clone()),
            ctx,
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &ManifestIndex {
        &self.index
    }

    /// Resolve `id` to its fully merged descriptor.
    pub async fn resolve(&self, id: &str) -> LauncherResult<Arc<VersionDescriptor>> {
        let resolved = self.resolve_chain(id.trim().to_string(), Vec::new()).await?;
        Ok(resolved.descriptor)
    }

    fn resolve_chain<'a>(&'a self, id: String, chain: Vec<String>) -> ResolveFuture<'a> {
        Box::pin(async move {
            let key = id.to_lowercase();
            if let Some(hit) = self.cache.lock().await.get(&key).cloned() {
                return Ok(hit);
            }
            if chain.contains(&key) {
                return Err(LauncherError::InheritanceCycle(id));
            }

            let entry = self.index.find(&id).await?;
            let path = self
                .ctx
                .versions_dir()
                .join(entry.folder())
                .join(format!("{}.json", entry.id));
            let raw = self.load_raw(&entry, &path).await?;

            let parent_id = raw
                .get("inheritsFrom")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .or_else(|| entry.base.clone())
                .filter(|parent| !parent.eq_ignore_ascii_case(&entry.id));

            let (merged, folder) = match parent_id {
                Some(parent_id) => {
                    debug!("{} inherits from {}", entry.id, parent_id);
                    let mut next = chain;
                    next.push(key.clone());
                    let parent = self.resolve_chain(parent_id, next).await?;
                    let merged = merge_descriptors(parent.raw.as_ref().clone(), raw);
                    (merged, parent.descriptor.folder.clone())
                }
                None => (raw, entry.folder().to_string()),
            };

            let mut descriptor: VersionDescriptor = serde_json::from_value(merged.clone())?;
            descriptor.folder = folder;

            let resolved = Resolved {
                raw: Arc::new(merged),
                descriptor: Arc::new(descriptor),
            };
            self.cache.lock().await.insert(key, resolved.clone());
            Ok(resolved)
        })
    }

    /// Local copy if it matches the manifest hash, otherwise a fresh fetch,
    /// otherwise whatever is on disk.
    async fn load_raw(&self, entry: &ManifestEntry, path: &Path) -> LauncherResult<Value> {
        let chk = Checksum::new(entry.sha1.clone(), None);

        if !chk.is_empty() && is_valid(path, &chk).await {
            debug!("Using cached descriptor {:?}", path);
            return read_json(path).await;
        }

        if let Some(url) = &entry.url {
            info!("Fetching version descriptor {}", entry.id);
            self.fetcher.fetch_to_file(url, path).await?;
            check_file(path, &chk).await?;
            return read_json(path).await;
        }

        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return read_json(path).await;
        }

        if entry.is_unknown() {
            Err(LauncherError::UnknownVersion(entry.id.clone()))
        } else {
            Err(LauncherError::MissingDescriptor(entry.id.clone()))
        }
    }
}

async fn read_json(path: &Path) -> LauncherResult<Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}
