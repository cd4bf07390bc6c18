use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::downloader::{BatchReport, DownloadEngine, Fetcher};
use crate::core::error::LauncherResult;
use crate::core::planner::{
    copy_legacy_assets, plan_assets, plan_client, plan_libraries, plan_runtime, runtime_dir,
    ClasspathIndex,
};
use crate::core::state::LauncherContext;
use crate::core::version::{AssetIndexInfo, ManifestResolver, VersionDescriptor};

/// Version whose asset index stands in for descriptors that have none.
const LEGACY_ASSET_BASE: &str = "1.0";

/// What an install produced, enough for a launcher to build a command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallResult {
    pub id: String,
    pub main_class: Option<String>,
    pub classpath: Vec<PathBuf>,
    pub jvm_args: Vec<String>,
    pub game_args: Vec<String>,
    pub asset_index_id: String,
    pub runtime_component: String,
    /// `None` when no runtime manifest exists for this platform.
    pub runtime_dir: Option<PathBuf>,
    pub java_major: Option<u32>,
    pub failed: Vec<String>,
}

/// Resolve a version and bring every file it needs onto disk.
pub struct VersionInstaller {
    ctx: LauncherContext,
    fetcher: Arc<dyn Fetcher>,
    resolver: ManifestResolver,
    engine: DownloadEngine,
}

impl VersionInstaller {
    pub fn new(ctx: LauncherContext, fetcher: Arc<dyn Fetcher>) -> LauncherResult<Self> {
        let engine = DownloadEngine::new(ctx.clone(), fetcher.clone())?;
        Ok(Self::with_engine(ctx, fetcher, engine))
    }

    pub fn with_engine(
        ctx: LauncherContext,
        fetcher: Arc<dyn Fetcher>,
        engine: DownloadEngine,
    ) -> Self {
        Self {
            resolver: ManifestResolver::new(ctx.clone(), fetcher.clone()),
            ctx,
            fetcher,
            engine,
        }
    }

    pub fn resolver(&self) -> &ManifestResolver {
        &self.resolver
    }

    pub fn engine(&self) -> &DownloadEngine {
        &self.engine
    }

    /// Refresh the manifest index files when none exist yet.
    pub async fn ensure_manifests(&self) -> LauncherResult<()> {
        if self.resolver.index().entries().await?.is_empty() {
            info!("No manifests on disk, refreshing");
            self.resolver.index().refresh(self.fetcher.as_ref()).await?;
        }
        Ok(())
    }

    pub async fn install(&self, id: &str) -> LauncherResult<InstallResult> {
        info!("Installing {}", id);
        self.ensure_manifests().await?;

        let desc = self.resolver.resolve(id).await?;
        let fetcher = self.fetcher.as_ref();

        // 1. Libraries and the version jar
        let libraries = plan_libraries(&self.ctx, &desc, fetcher).await?;
        let mut tasks = libraries.tasks;
        tasks.extend(plan_client(&self.ctx, &desc));

        // 2. Assets
        let asset_info = self.asset_index_for(&desc).await?;
        let assets = match &asset_info {
            Some(info) => Some(plan_assets(&self.ctx, info, fetcher).await?),
            None => {
                warn!("{} has no asset index, skipping assets", desc.id);
                None
            }
        };
        if let Some(plan) = &assets {
            tasks.extend(plan.tasks.iter().cloned());
        }

        // 3. Runtime
        let component = desc.runtime_component();
        let runtime = match plan_runtime(&self.ctx, &component).await {
            Ok(runtime_tasks) => {
                tasks.extend(runtime_tasks);
                Some(runtime_dir(&self.ctx, &component))
            }
            Err(e) if !e.is_fatal() => {
                warn!("Runtime {} unavailable: {}", component, e);
                None
            }
            Err(e) => return Err(e),
        };

        // 4. One batch for everything
        let report: BatchReport = self.engine.download(tasks).await?;

        // 5. Legacy asset mirror, after the objects exist
        if let Some(plan) = &assets {
            copy_legacy_assets(&self.ctx, &plan.index).await?;
        }

        // 6. Classpath
        let classpath = ClasspathIndex::build(&self.ctx, &desc, &libraries.classpath);
        classpath
            .write(&ClasspathIndex::path_for(&self.ctx, &desc))
            .await?;

        if report.is_success() {
            info!("{} installed", desc.id);
        } else {
            warn!("{} installed with {} failed files", desc.id, report.failed.len());
        }

        let platform = self.ctx.platform();
        Ok(InstallResult {
            id: desc.id.clone(),
            main_class: desc.main_class.clone(),
            classpath: classpath.entries,
            jvm_args: desc.jvm_arguments(platform),
            game_args: desc.game_arguments(platform),
            asset_index_id: asset_info.map_or_else(|| desc.asset_index_id(), |info| info.id),
            runtime_component: component,
            runtime_dir: runtime,
            java_major: desc.java_version.as_ref().and_then(|j| j.major_version),
            failed: report.failed,
        })
    }

    /// The descriptor's own index, or the one `1.0` uses.
    async fn asset_index_for(
        &self,
        desc: &VersionDescriptor,
    ) -> LauncherResult<Option<AssetIndexInfo>> {
        if let Some(info) = &desc.asset_index {
            return Ok(Some(info.clone()));
        }
        match self.resolver.resolve(LEGACY_ASSET_BASE).await {
            Ok(base) => Ok(base.asset_index.clone()),
            Err(e) => {
                warn!("Cannot resolve {} for its asset index: {}", LEGACY_ASSET_BASE, e);
                Ok(None)
            }
        }
    }
}
