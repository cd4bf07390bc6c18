// ─── Download Task ───
// One file for the engine: where it goes, where it comes from, how to check it.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

/// One expected hash or a set of acceptable alternates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Sha1Spec {
    One(String),
    AnyOf(Vec<String>),
}

impl Sha1Spec {
    pub fn accepts(&self, actual: &str) -> bool {
        match self {
            Sha1Spec::One(expected) => expected.trim().eq_ignore_ascii_case(actual),
            Sha1Spec::AnyOf(all) => all.iter().any(|e| e.trim().eq_ignore_ascii_case(actual)),
        }
    }

    /// First acceptable hash, for error messages.
    pub fn primary(&self) -> &str {
        match self {
            Sha1Spec::One(expected) => expected,
            Sha1Spec::AnyOf(all) => all.first().map(String::as_str).unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checksum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<Sha1Spec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Checksum {
    pub fn new(sha1: Option<String>, size: Option<u64>) -> Self {
        Self {
            sha1: sha1.filter(|s| !s.trim().is_empty()).map(Sha1Spec::One),
            size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sha1.is_none() && self.size.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    #[default]
    Zip,
    /// Single LZMA stream decompressed to one file.
    Lzma,
}

/// Post-download extraction step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unzip {
    /// Directory segments of the extraction target.
    pub target: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub kind: ArchiveKind,
    /// File name of the decompressed output (LZMA only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

impl Unzip {
    pub fn zip(target: &Path, exclude: Vec<String>) -> Self {
        Self {
            target: path_segments(target),
            exclude,
            kind: ArchiveKind::Zip,
            rename: None,
        }
    }

    pub fn lzma(target: &Path, rename: impl Into<String>) -> Self {
        Self {
            target: path_segments(target),
            exclude: Vec::new(),
            kind: ArchiveKind::Lzma,
            rename: Some(rename.into()),
        }
    }

    pub fn target_dir(&self) -> PathBuf {
        join_segments(&self.target)
    }

    /// File produced by an LZMA step.
    pub fn output_file(&self) -> Option<PathBuf> {
        self.rename.as_ref().map(|name| self.target_dir().join(name))
    }
}

/// One unit of work for the download engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadTask {
    /// Unique within a batch.
    pub key: String,
    /// Directory segments of the destination.
    pub path: Vec<String>,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub chk: Checksum,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unzip: Option<Unzip>,
    #[serde(default)]
    pub executable: bool,
    /// Skip entirely when the destination already exists.
    #[serde(default)]
    pub dynamic: bool,
}

impl DownloadTask {
    /// Build a task writing to `dest`. The key defaults to the destination path.
    pub fn new(dest: &Path, url: impl Into<String>) -> Self {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let path = dest.parent().map(path_segments).unwrap_or_default();
        Self {
            key: dest.to_string_lossy().replace('\\', "/"),
            path,
            name,
            url: url.into(),
            chk: Checksum::default(),
            unzip: None,
            executable: false,
            dynamic: false,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_checksum(mut self, chk: Checksum) -> Self {
        self.chk = chk;
        self
    }

    pub fn with_unzip(mut self, unzip: Unzip) -> Self {
        self.unzip = Some(unzip);
        self
    }

    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn destination(&self) -> PathBuf {
        join_segments(&self.path).join(&self.name)
    }

    /// File the `executable` bit applies to: the decompressed output for
    /// LZMA tasks, the download itself otherwise.
    pub fn executable_target(&self) -> PathBuf {
        self.unzip
            .as_ref()
            .and_then(Unzip::output_file)
            .unwrap_or_else(|| self.destination())
    }

    /// Declared size used for load balancing; unknown sizes sort first.
    pub fn sort_weight(&self) -> u64 {
        self.chk.size.unwrap_or(u64::MAX)
    }

    pub fn needs_post_processing(&self) -> bool {
        self.unzip.is_some() || self.executable
    }

    /// Reject any parent-directory segment in the destination or the
    /// extraction target.
    pub fn ensure_no_traversal(&self) -> LauncherResult<()> {
        let segments = self
            .path
            .iter()
            .chain(std::iter::once(&self.name))
            .chain(self.unzip.iter().flat_map(|u| u.target.iter()));
        for segment in segments {
            if has_parent_component(segment) {
                return Err(LauncherError::PathTraversal(self.key.clone()));
            }
        }
        if self.name.is_empty() || self.name.contains('/') || self.name.contains('\\') {
            return Err(LauncherError::PathTraversal(self.key.clone()));
        }
        Ok(())
    }

    /// Re-anchor a task whose segments are relative to `root`.
    ///
    /// Absolute segments, prefixes and `..` are rejected so the result is
    /// always a descendant of `root`.
    pub fn rebased(mut self, root: &Path) -> LauncherResult<Self> {
        self.ensure_no_traversal()?;
        let relative_only = |segments: &[String]| {
            segments.iter().all(|s| {
                Path::new(s)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            })
        };
        if !relative_only(&self.path)
            || !self.unzip.as_ref().map_or(true, |u| relative_only(&u.target))
        {
            return Err(LauncherError::PathTraversal(self.key.clone()));
        }

        let mut root_segments = path_segments(root);
        root_segments.extend(self.path);
        self.path = root_segments;

        if let Some(unzip) = self.unzip.as_mut() {
            let mut target = path_segments(root);
            target.append(&mut unzip.target);
            unzip.target = target;
        }

        if !self.destination().starts_with(root) {
            return Err(LauncherError::PathTraversal(self.key.clone()));
        }
        Ok(self)
    }
}

fn has_parent_component(segment: &str) -> bool {
    Path::new(segment)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
        || segment.split(['/', '\\']).any(|part| part == "..")
}

/// Split a path into the segments stored on a task.
pub fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect()
}

pub fn join_segments(segments: &[String]) -> PathBuf {
    let mut out = PathBuf::new();
    for segment in segments {
        out.push(segment);
    }
    out
}
