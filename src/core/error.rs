use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the whole crate.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-1 mismatch for {path:?}: expected {expected}, got {actual}")]
    Sha1Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for {path:?}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Version resolution ──────────────────────────────
    #[error("Unknown version '{0}', please check the spelling of the version id")]
    UnknownVersion(String),

    #[error("Version descriptor for '{0}' is missing and no manifest entry points to it")]
    MissingDescriptor(String),

    #[error("Version '{0}' inherits from itself")]
    InheritanceCycle(String),

    // ── Security ────────────────────────────────────────
    #[error("Security violation: '{0}' escapes the install root")]
    PathTraversal(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("LZMA decompression error for {path:?}: {message}")]
    Lzma { path: PathBuf, message: String },

    // ── Workers ─────────────────────────────────────────
    #[error("Download worker error: {0}")]
    Worker(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    /// Resolution and security errors abort an install step; everything
    /// else is a per-file problem the engine retries.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LauncherError::UnknownVersion(_)
                | LauncherError::MissingDescriptor(_)
                | LauncherError::InheritanceCycle(_)
                | LauncherError::PathTraversal(_)
        )
    }
}
