// ─── Library Planner ───
// Library entries → download tasks, plus the ordered classpath they produce.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::downloader::{Checksum, DownloadTask, Fetcher, Sha1Spec, Unzip};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;
use crate::core::state::LauncherContext;
use crate::core::version::{Artifact, Library, VersionDescriptor};

const SIDECAR_ATTEMPTS: usize = 3;

/// Library tasks and the classpath entries they back.
#[derive(Debug, Default)]
pub struct LibraryPlan {
    pub tasks: Vec<DownloadTask>,
    /// Library jars in descriptor order, without duplicates. The version jar
    /// is appended by [`ClasspathIndex::build`].
    pub classpath: Vec<PathBuf>,
}

/// Persisted classpath for a resolved version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClasspathIndex {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<PathBuf>,
}

impl ClasspathIndex {
    /// Library entries followed by the version jar.
    pub fn build(ctx: &LauncherContext, desc: &VersionDescriptor, libraries: &[PathBuf]) -> Self {
        let mut seen = HashSet::new();
        let mut entries: Vec<PathBuf> = libraries
            .iter()
            .filter(|p| seen.insert((*p).clone()))
            .cloned()
            .collect();
        let jar = super::client::client_jar_path(ctx, desc);
        if seen.insert(jar.clone()) {
            entries.push(jar);
        }
        Self {
            id: desc.id.clone(),
            generated_at: Utc::now(),
            entries,
        }
    }

    /// `versions/<folder>/<id>.classpath.json`
    pub fn path_for(ctx: &LauncherContext, desc: &VersionDescriptor) -> PathBuf {
        ctx.versions_dir()
            .join(&desc.folder)
            .join(format!("{}.classpath.json", desc.id))
    }

    pub async fn write(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| LauncherError::io(path, e))
    }
}

/// Plan every active library of `desc`.
pub async fn plan_libraries(
    ctx: &LauncherContext,
    desc: &VersionDescriptor,
    fetcher: &dyn Fetcher,
) -> LauncherResult<LibraryPlan> {
    let platform = ctx.platform();
    let mut plan = LibraryPlan::default();
    let mut on_classpath = HashSet::new();

    for library in &desc.libraries {
        if !library.is_active(platform) {
            debug!("Skipping inactive library {}", library.name);
            continue;
        }

        let jar = match &library.downloads {
            Some(downloads) => {
                if let Some(native) = native_artifact(library, ctx) {
                    let path = artifact_path(&native, library, Some(ctx))?;
                    plan.tasks.push(native_task(ctx, library, &native, &path));
                }
                match &downloads.artifact {
                    Some(artifact) => {
                        let path = artifact_path(artifact, library, None)?;
                        if !artifact.url.is_empty() {
                            let dest = ctx.libraries_dir().join(&path);
                            let chk = Checksum::new(artifact.sha1.clone(), artifact.size);
                            plan.tasks.push(
                                DownloadTask::new(&dest, artifact.url.clone())
                                    .with_key(path.clone())
                                    .with_checksum(chk),
                            );
                        }
                        Some(path)
                    }
                    None => None,
                }
            }
            None => {
                let maven = MavenArtifact::parse(&library.name)?;
                if let Some(classifier) = library.native_classifier(platform) {
                    let native = maven.with_classifier(&classifier);
                    plan.tasks.push(repo_task(ctx, library, &native, fetcher, true).await);
                }
                plan.tasks.push(repo_task(ctx, library, &maven, fetcher, false).await);
                Some(maven.repository_path())
            }
        };

        if let Some(path) = jar {
            let full = ctx.libraries_dir().join(&path);
            if on_classpath.insert(full.clone()) {
                plan.classpath.push(full);
            }
        }
    }

    info!(
        "Planned {} library downloads ({} classpath entries)",
        plan.tasks.len(),
        plan.classpath.len()
    );
    Ok(plan)
}

/// Host native classifier entry from `downloads.classifiers`.
fn native_artifact(library: &Library, ctx: &LauncherContext) -> Option<Artifact> {
    let classifier = library.native_classifier(ctx.platform())?;
    library
        .downloads
        .as_ref()?
        .classifiers
        .as_ref()?
        .get(&classifier)
        .cloned()
}

/// Declared path, or the Maven layout derived from the library name.
fn artifact_path(
    artifact: &Artifact,
    library: &Library,
    native_ctx: Option<&LauncherContext>,
) -> LauncherResult<String> {
    if let Some(path) = artifact.path.as_ref().filter(|p| !p.is_empty()) {
        return Ok(path.clone());
    }
    let mut maven = MavenArtifact::parse(&library.name)?;
    if let Some(ctx) = native_ctx {
        if let Some(classifier) = library.native_classifier(ctx.platform()) {
            maven = maven.with_classifier(&classifier);
        }
    }
    Ok(maven.repository_path())
}

fn native_task(
    ctx: &LauncherContext,
    library: &Library,
    native: &Artifact,
    path: &str,
) -> DownloadTask {
    DownloadTask::new(&ctx.libraries_dir().join(path), native.url.clone())
        .with_key(path.to_string())
        .with_checksum(Checksum::new(native.sha1.clone(), native.size))
        .with_unzip(Unzip::zip(&ctx.natives_dir(), natives_exclude(ctx, library)))
}

fn natives_exclude(ctx: &LauncherContext, library: &Library) -> Vec<String> {
    match &library.extract {
        Some(extract) if !extract.exclude.is_empty() => extract.exclude.clone(),
        _ => ctx.settings().natives_exclude.clone(),
    }
}

/// Task for a library hosted in a plain Maven repository.
async fn repo_task(
    ctx: &LauncherContext,
    library: &Library,
    maven: &MavenArtifact,
    fetcher: &dyn Fetcher,
    native: bool,
) -> DownloadTask {
    let repo = library
        .url
        .clone()
        .unwrap_or_else(|| ctx.settings().libraries_url.clone());
    let path = maven.repository_path();
    let url = maven.url_in(&repo);

    let sha1 = match &library.checksums {
        Some(checksums) if !checksums.is_empty() => Some(Sha1Spec::AnyOf(checksums.clone())),
        _ => fetch_sidecar(fetcher, &url).await.map(Sha1Spec::One),
    };

    let mut task = DownloadTask::new(&ctx.libraries_dir().join(&path), url)
        .with_key(path)
        .with_checksum(Checksum { sha1, size: None });
    if native {
        task = task.with_unzip(Unzip::zip(&ctx.natives_dir(), natives_exclude(ctx, library)));
    }
    task
}

/// `<url>.sha1`, first token only. `None` when the repository has none.
async fn fetch_sidecar(fetcher: &dyn Fetcher, url: &str) -> Option<String> {
    let sidecar = format!("{}.sha1", url);
    for attempt in 1..=SIDECAR_ATTEMPTS {
        match fetcher.fetch_text(&sidecar).await {
            Ok(body) => {
                return body
                    .split_whitespace()
                    .next()
                    .map(ToString::to_string)
                    .filter(|h| !h.is_empty());
            }
            Err(LauncherError::DownloadFailed { status: 404, .. }) => return None,
            Err(e) => debug!("Checksum sidecar {} attempt {} failed: {}", sidecar, attempt, e),
        }
    }
    warn!("No checksum for {}, downloading unverified", url);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::testing::MemoryFetcher;
    use crate::core::state::LauncherSettings;
    use crate::core::version::PlatformContext;

    fn ctx() -> LauncherContext {
        LauncherContext::with_platform(
            LauncherSettings {
                root: PathBuf::from("/mc"),
                ..LauncherSettings::default()
            },
            PlatformContext::new("linux", "x64", "6.1"),
        )
    }

    fn descriptor(libraries: &str) -> VersionDescriptor {
        let mut desc: VersionDescriptor = serde_json::from_str(&format!(
            r#"{{"id":"1.20.4","libraries":{},"downloads":{{"client":{{"url":"https://example.com/client.jar"}}}}}}"#,
            libraries
        ))
        .unwrap();
        desc.folder = "1.20.4".into();
        desc
    }

    #[tokio::test]
    async fn rules_filter_and_natives_get_an_unzip_step() {
        let desc = descriptor(
            r#"[
            {"name":"a:win-only:1","rules":[{"action":"allow","os":{"name":"windows"}}],
             "downloads":{"artifact":{"url":"https://example.com/w.jar","path":"a/win-only/1/win-only-1.jar"}}},
            {"name":"org.lwjgl:lwjgl:3.3.3","natives":{"linux":"natives-linux"},
             "downloads":{"artifact":{"url":"https://example.com/l.jar","sha1":"aa","size":1,"path":"org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3.jar"},
                          "classifiers":{"natives-linux":{"url":"https://example.com/n.jar","path":"org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-linux.jar"}}}}
        ]"#,
        );
        let plan = plan_libraries(&ctx(), &desc, &MemoryFetcher::new()).await.unwrap();

        assert_eq!(plan.tasks.len(), 2);
        let native = plan
            .tasks
            .iter()
            .find(|t| t.unzip.is_some())
            .unwrap();
        let unzip = native.unzip.as_ref().unwrap();
        assert_eq!(unzip.target_dir(), PathBuf::from("/mc/natives"));
        assert_eq!(unzip.exclude, vec!["META-INF/".to_string()]);
        assert_eq!(
            plan.classpath,
            vec![PathBuf::from("/mc/libraries/org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3.jar")]
        );
    }

    #[tokio::test]
    async fn repository_libraries_use_the_sha1_sidecar() {
        let desc = descriptor(
            r#"[{"name":"net.fabricmc:intermediary:1.20.4","url":"https://maven.fabricmc.net"}]"#,
        );
        let fetcher = MemoryFetcher::new();
        fetcher.serve(
            "https://maven.fabricmc.net/net/fabricmc/intermediary/1.20.4/intermediary-1.20.4.jar.sha1",
            "0123456789abcdef0123456789abcdef01234567  intermediary-1.20.4.jar\n",
        );
        let plan = plan_libraries(&ctx(), &desc, &fetcher).await.unwrap();
        let task = &plan.tasks[0];
        assert_eq!(
            task.url,
            "https://maven.fabricmc.net/net/fabricmc/intermediary/1.20.4/intermediary-1.20.4.jar"
        );
        assert_eq!(
            task.chk.sha1,
            Some(Sha1Spec::One("0123456789abcdef0123456789abcdef01234567".into()))
        );
    }

    #[tokio::test]
    async fn missing_sidecar_yields_an_unchecked_task() {
        let desc = descriptor(r#"[{"name":"com.example:lib:1.0"}]"#);
        let fetcher = MemoryFetcher::new();
        let plan = plan_libraries(&ctx(), &desc, &fetcher).await.unwrap();
        assert!(plan.tasks[0].chk.sha1.is_none());
        assert!(plan.tasks[0].url.starts_with("https://libraries.minecraft.net/com/example/lib/1.0/"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn declared_checksums_skip_the_sidecar() {
        let desc = descriptor(r#"[{"name":"com.example:lib:1.0","checksums":["aa","bb"]}]"#);
        let fetcher = MemoryFetcher::new();
        let plan = plan_libraries(&ctx(), &desc, &fetcher).await.unwrap();
        assert_eq!(fetcher.calls(), 0);
        assert!(matches!(plan.tasks[0].chk.sha1, Some(Sha1Spec::AnyOf(_))));
    }

    #[test]
    fn classpath_index_dedups_and_appends_the_version_jar() {
        let desc = descriptor("[]");
        let libs = vec![PathBuf::from("/mc/libraries/a.jar"), PathBuf::from("/mc/libraries/a.jar")];
        let index = ClasspathIndex::build(&ctx(), &desc, &libs);
        assert_eq!(
            index.entries,
            vec![
                PathBuf::from("/mc/libraries/a.jar"),
                PathBuf::from("/mc/versions/1.20.4/1.20.4.jar"),
            ]
        );
        assert_eq!(
            ClasspathIndex::path_for(&ctx(), &desc),
            PathBuf::from("/mc/versions/1.20.4/1.20.4.classpath.json")
        );
    }
}
