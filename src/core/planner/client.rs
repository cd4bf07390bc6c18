use std::path::PathBuf;

use crate::core::downloader::{Checksum, DownloadTask};
use crate::core::state::LauncherContext;
use crate::core::version::VersionDescriptor;

/// `versions/<folder>/<folder>.jar`, shared by every id built on the same base.
pub fn client_jar_path(ctx: &LauncherContext, desc: &VersionDescriptor) -> PathBuf {
    ctx.versions_dir()
        .join(&desc.folder)
        .join(format!("{}.jar", desc.folder))
}

/// Task for `downloads.client`, if the descriptor has one.
pub fn plan_client(ctx: &LauncherContext, desc: &VersionDescriptor) -> Option<DownloadTask> {
    let client = desc.downloads.get("client")?;
    if client.url.is_empty() {
        return None;
    }
    Some(
        DownloadTask::new(&client_jar_path(ctx, desc), client.url.clone())
            .with_key(format!("versions/{}/{}.jar", desc.folder, desc.folder))
            .with_checksum(Checksum::new(client.sha1.clone(), client.size)),
    )
}
