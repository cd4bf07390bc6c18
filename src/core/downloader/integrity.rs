// ─── Integrity ───
// Size and SHA-1 checks shared by the worker, the supervisor pre-check and
// the metadata fetches.

use std::io::Read;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::debug;

use super::client::Fetcher;
use super::task::Checksum;
use crate::core::error::{LauncherError, LauncherResult};

/// Hex SHA-1 of a file, hashed on the blocking pool.
pub async fn sha1_file(path: &Path) -> LauncherResult<String> {
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&owned).map_err(|e| LauncherError::io(&owned, e))?;
        let mut hasher = Sha1::new();
        let mut buf = [0_u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).map_err(|e| LauncherError::io(&owned, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| LauncherError::Worker(format!("hash task panicked: {}", e)))?
}

/// Check `path` against `chk`: existence, then size, then SHA-1.
///
/// Returns the first mismatch as an error; a missing file is `Ok(false)`.
pub async fn check_file(path: &Path, chk: &Checksum) -> LauncherResult<bool> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(LauncherError::io(path, e)),
    };

    if let Some(expected) = chk.size {
        if meta.len() != expected {
            return Err(LauncherError::SizeMismatch {
                path: path.to_path_buf(),
                expected,
                actual: meta.len(),
            });
        }
    }

    if let Some(spec) = &chk.sha1 {
        let actual = sha1_file(path).await?;
        if !spec.accepts(&actual) {
            return Err(LauncherError::Sha1Mismatch {
                path: path.to_path_buf(),
                expected: spec.primary().to_string(),
                actual,
            });
        }
    }

    Ok(true)
}

/// `true` when the file exists and passes every declared check.
pub async fn is_valid(path: &Path, chk: &Checksum) -> bool {
    match check_file(path, chk).await {
        Ok(valid) => valid,
        Err(e) => {
            debug!("Pre-check failed for {:?}: {}", path, e);
            false
        }
    }
}

/// Fetch `url` into `dest` unless a valid copy is already there, then verify.
///
/// Used for index documents that must be on disk before planning.
pub async fn fetch_verified(
    fetcher: &dyn Fetcher,
    url: &str,
    dest: &Path,
    chk: &Checksum,
) -> LauncherResult<()> {
    if !chk.is_empty() && is_valid(dest, chk).await {
        debug!("Reusing verified {:?}", dest);
        return Ok(());
    }
    fetcher.fetch_to_file(url, dest).await?;
    if !check_file(dest, chk).await? {
        return Err(LauncherError::Other(format!(
            "{:?} vanished after download",
            dest
        )));
    }
    Ok(())
}
