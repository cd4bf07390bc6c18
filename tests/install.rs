use std::path::Path;
use std::sync::Arc;

use sha1::{Digest, Sha1};

use launchkit::core::downloader::testing::MemoryFetcher;
use launchkit::{
    LauncherContext, LauncherError, LauncherSettings, PlatformContext, VersionInstaller,
};

const LIB_URL: &str = "https://libraries.test/com/example/lib/1.0/lib-1.0.jar";
const CLIENT_URL: &str = "https://meta.test/1.20.4/client.jar";
const DESCRIPTOR_URL: &str = "https://meta.test/1.20.4.json";
const ASSET_INDEX_URL: &str = "https://meta.test/indexes/legacy.json";

fn sha1_hex(body: &[u8]) -> String {
    hex::encode(Sha1::digest(body))
}

fn context(root: &Path) -> LauncherContext {
    LauncherContext::with_platform(
        LauncherSettings {
            root: root.to_path_buf(),
            workers: Some(2),
            ..LauncherSettings::default()
        },
        PlatformContext::new("linux", "x64", "6.1"),
    )
}

fn object_url(hash: &str) -> String {
    format!("https://resources.download.minecraft.net/{}/{}", &hash[..2], hash)
}

/// Registers a small but complete version on `fetcher` and writes its
/// manifest entry under `root`.
fn publish_version(root: &Path, fetcher: &MemoryFetcher) {
    let lib = b"library bytes";
    let client = b"client bytes";
    let icon = b"icon";
    let sound = b"sound";

    let asset_index = format!(
        r#"{{"virtual":true,"objects":{{
            "icons/a.png":{{"hash":"{}","size":{}}},
            "sounds/b.ogg":{{"hash":"{}","size":{}}}
        }}}}"#,
        sha1_hex(icon),
        icon.len(),
        sha1_hex(sound),
        sound.len()
    );

    let descriptor = format!(
        r#"{{
            "id":"1.20.4",
            "type":"release",
            "mainClass":"net.minecraft.client.main.Main",
            "arguments":{{"game":["--version","${{version_name}}"],"jvm":["-Xss1M"]}},
            "javaVersion":{{"component":"java-runtime-gamma","majorVersion":17}},
            "assetIndex":{{"id":"legacy","url":"{asset_url}","sha1":"{asset_sha}","size":{asset_size}}},
            "downloads":{{"client":{{"url":"{client_url}","sha1":"{client_sha}","size":{client_size}}}}},
            "libraries":[
                {{"name":"com.example:lib:1.0","downloads":{{"artifact":{{
                    "path":"com/example/lib/1.0/lib-1.0.jar",
                    "url":"{lib_url}","sha1":"{lib_sha}","size":{lib_size}}}}}}},
                {{"name":"com.example:mac-only:1.0","rules":[{{"action":"allow","os":{{"name":"osx"}}}}],
                  "downloads":{{"artifact":{{"path":"com/example/mac-only/1.0/mac-only-1.0.jar",
                    "url":"https://libraries.test/mac-only.jar"}}}}}}
            ]
        }}"#,
        asset_url = ASSET_INDEX_URL,
        asset_sha = sha1_hex(asset_index.as_bytes()),
        asset_size = asset_index.len(),
        client_url = CLIENT_URL,
        client_sha = sha1_hex(client),
        client_size = client.len(),
        lib_url = LIB_URL,
        lib_sha = sha1_hex(lib),
        lib_size = lib.len(),
    );

    fetcher
        .serve(DESCRIPTOR_URL, descriptor.clone())
        .serve(ASSET_INDEX_URL, asset_index)
        .serve(LIB_URL, lib.to_vec())
        .serve(CLIENT_URL, client.to_vec())
        .serve(object_url(&sha1_hex(icon)), icon.to_vec())
        .serve(object_url(&sha1_hex(sound)), sound.to_vec());

    let manifests = context(root).manifests_dir();
    std::fs::create_dir_all(&manifests).unwrap();
    std::fs::write(
        manifests.join("vanilla.json"),
        format!(
            r#"[{{"id":"1.20.4","type":"release","url":"{}","sha1":"{}"}}]"#,
            DESCRIPTOR_URL,
            sha1_hex(descriptor.as_bytes())
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn install_brings_every_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MemoryFetcher::new());
    publish_version(dir.path(), &fetcher);
    let ctx = context(dir.path());

    let installer = VersionInstaller::new(ctx.clone(), fetcher.clone()).unwrap();
    let result = installer.install("1.20.4").await.unwrap();

    assert!(result.failed.is_empty());
    assert_eq!(result.main_class.as_deref(), Some("net.minecraft.client.main.Main"));
    assert_eq!(result.java_major, Some(17));
    assert_eq!(result.runtime_component, "java-runtime-gamma");
    // No runtime manifest was refreshed, so the runtime is skipped.
    assert_eq!(result.runtime_dir, None);
    assert_eq!(result.jvm_args, vec!["-Xss1M".to_string()]);
    assert_eq!(result.asset_index_id, "legacy");

    let lib = ctx
        .libraries_dir()
        .join("com/example/lib/1.0/lib-1.0.jar");
    let jar = ctx.versions_dir().join("1.20.4").join("1.20.4.jar");
    assert_eq!(result.classpath, vec![lib.clone(), jar.clone()]);
    assert_eq!(std::fs::read(&lib).unwrap(), b"library bytes");
    assert_eq!(std::fs::read(&jar).unwrap(), b"client bytes");

    let legacy = ctx.assets_dir().join("legacy").join("virtual");
    assert_eq!(std::fs::read(legacy.join("icons/a.png")).unwrap(), b"icon");
    assert_eq!(std::fs::read(legacy.join("sounds/b.ogg")).unwrap(), b"sound");

    assert!(ctx
        .versions_dir()
        .join("1.20.4")
        .join("1.20.4.classpath.json")
        .exists());
    assert!(!fetcher
        .requested()
        .contains(&"https://libraries.test/mac-only.jar".to_string()));
}

#[tokio::test]
async fn reinstall_reuses_everything_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MemoryFetcher::new());
    publish_version(dir.path(), &fetcher);

    let installer = VersionInstaller::new(context(dir.path()), fetcher.clone()).unwrap();
    installer.install("1.20.4").await.unwrap();
    let after_first = fetcher.calls();
    // descriptor, asset index, library, client jar and two objects
    assert_eq!(after_first, 6);

    let fresh = VersionInstaller::new(context(dir.path()), fetcher.clone()).unwrap();
    let result = fresh.install("1.20.4").await.unwrap();
    assert!(result.failed.is_empty());
    assert_eq!(fetcher.calls(), after_first);
}

#[tokio::test]
async fn unknown_version_fails_without_downloading() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MemoryFetcher::new());
    publish_version(dir.path(), &fetcher);

    let installer = VersionInstaller::new(context(dir.path()), fetcher.clone()).unwrap();
    let err = installer.install("9.9.9").await.unwrap_err();
    assert!(matches!(err, LauncherError::UnknownVersion(ref id) if id == "9.9.9"));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn version_without_asset_index_reports_the_legacy_id() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(MemoryFetcher::new());
    let url = "https://meta.test/a1.0.json";
    let descriptor = r#"{"id":"a1.0","type":"old_alpha","mainClass":"net.minecraft.client.Minecraft"}"#;
    fetcher.serve(url, descriptor);

    let ctx = context(dir.path());
    std::fs::create_dir_all(ctx.manifests_dir()).unwrap();
    std::fs::write(
        ctx.manifests_dir().join("vanilla.json"),
        format!(
            r#"[{{"id":"a1.0","type":"old_alpha","url":"{}","sha1":"{}"}}]"#,
            url,
            sha1_hex(descriptor.as_bytes())
        ),
    )
    .unwrap();

    // `1.0` is not published either, so no index can be borrowed.
    let installer = VersionInstaller::new(ctx, fetcher.clone()).unwrap();
    let result = installer.install("a1.0").await.unwrap();

    assert_eq!(result.asset_index_id, launchkit::core::version::LEGACY_ASSET_INDEX);
    assert_eq!(result.runtime_dir, None);
    assert_eq!(fetcher.calls(), 1);
}
