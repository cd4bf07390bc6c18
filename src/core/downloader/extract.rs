// ─── Post-processing ───
// Zip extraction for natives, LZMA decompression for runtime files and the
// executable bit. Archive work runs on the blocking pool.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};

use super::task::{ArchiveKind, DownloadTask, Unzip};
use crate::core::error::{LauncherError, LauncherResult};

/// Run every post-download step a task declares.
pub async fn post_process(task: &DownloadTask) -> LauncherResult<()> {
    if let Some(unzip) = &task.unzip {
        let archive = task.destination();
        let unzip = unzip.clone();
        tokio::task::spawn_blocking(move || match unzip.kind {
            ArchiveKind::Zip => extract_zip(&archive, &unzip.target_dir(), &unzip.exclude),
            ArchiveKind::Lzma => decompress_lzma(&archive, &unzip),
        })
        .await
        .map_err(|e| LauncherError::Worker(format!("extraction task panicked: {}", e)))??;
    }

    if task.executable {
        make_executable(&task.executable_target())?;
    }
    Ok(())
}

/// Compile exclude patterns. `dir/` means everything below `dir`.
fn compile_excludes(exclude: &[String]) -> Vec<Pattern> {
    exclude
        .iter()
        .filter_map(|raw| {
            let expanded = if raw.ends_with('/') {
                format!("{}**", raw)
            } else {
                raw.clone()
            };
            match Pattern::new(&expanded) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Ignoring bad exclude pattern '{}': {}", raw, e);
                    None
                }
            }
        })
        .collect()
}

/// Extract `archive` into `target`, skipping excluded and unsafe entries.
pub fn extract_zip(archive: &Path, target: &Path, exclude: &[String]) -> LauncherResult<()> {
    let file = File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))?;
    let excludes = compile_excludes(exclude);

    std::fs::create_dir_all(target).map_err(|e| LauncherError::io(target, e))?;

    let mut extracted = 0_usize;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = entry.name().to_string();

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe zip entry '{}' in {:?}", name, archive);
            continue;
        };
        if excludes.iter().any(|p| p.matches(&name)) {
            continue;
        }

        let out_path = target.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&out_path, e))?;
        extracted += 1;
    }

    debug!("Extracted {} entries from {:?} into {:?}", extracted, archive, target);
    Ok(())
}

/// Decompress a single-stream LZMA file to `<target>/<rename>`.
pub fn decompress_lzma(archive: &Path, unzip: &Unzip) -> LauncherResult<()> {
    let output: PathBuf = unzip.output_file().ok_or_else(|| LauncherError::Lzma {
        path: archive.to_path_buf(),
        message: "no output name".into(),
    })?;
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }

    let input = File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let out = File::create(&output).map_err(|e| LauncherError::io(&output, e))?;
    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(out);
    lzma_rs::lzma_decompress(&mut reader, &mut writer).map_err(|e| LauncherError::Lzma {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;

    debug!("Decompressed {:?} -> {:?}", archive, output);
    Ok(())
}

/// `chmod 755`; a no-op where permissions bits do not exist.
pub fn make_executable(path: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|e| LauncherError::io(path, e))?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).map_err(|e| LauncherError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
