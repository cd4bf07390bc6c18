use std::fmt;
use std::str::FromStr;

use crate::core::error::{LauncherError, LauncherResult};

/// A library name in Maven notation, as used by descriptors without a
/// `downloads` block.
///
/// Accepted forms: `group:artifact:version`, with an optional `:classifier`
/// and an optional `@extension` suffix (default `jar`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl MavenArtifact {
    /// ```
    /// use launchkit::core::maven::MavenArtifact;
    /// let lib = MavenArtifact::parse("net.fabricmc:intermediary:1.20.4").unwrap();
    /// assert_eq!(lib.repository_path(), "net/fabricmc/intermediary/1.20.4/intermediary-1.20.4.jar");
    /// ```
    pub fn parse(name: &str) -> LauncherResult<Self> {
        let invalid = || LauncherError::InvalidMavenCoordinate(name.to_string());
        let (coordinate, extension) = match name.trim().rsplit_once('@') {
            Some((coordinate, ext)) if !ext.is_empty() => (coordinate, ext),
            Some(_) => return Err(invalid()),
            None => (name.trim(), "jar"),
        };

        let mut parts = coordinate.split(':');
        let mut next = || parts.next().filter(|p| !p.is_empty()).map(str::to_string);
        let (Some(group), Some(artifact), Some(version)) = (next(), next(), next()) else {
            return Err(invalid());
        };
        let classifier = next();
        if next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            group,
            artifact,
            version,
            classifier,
            extension: extension.to_string(),
        })
    }

    /// Same library with another classifier, e.g. `natives-linux`.
    pub fn with_classifier(&self, classifier: &str) -> Self {
        Self {
            classifier: Some(classifier.to_string()),
            ..self.clone()
        }
    }

    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact, self.version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// `group/as/dirs/artifact/version/file`, always with forward slashes.
    /// Doubles as the path under the libraries directory.
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.file_name()
        )
    }

    /// Download URL under a repository base, with or without a trailing slash.
    pub fn url_in(&self, repository: &str) -> String {
        format!("{}/{}", repository.trim_end_matches('/'), self.repository_path())
    }
}

impl FromStr for MavenArtifact {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}
