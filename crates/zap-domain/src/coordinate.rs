use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const SNAPSHOT_SUFFIX: &str = "SNAPSHOT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinateError {
    #[error("coordinate field `{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("invalid coordinate `{0}` (expected group:artifact:version[:classifier])")]
    Malformed(String),
}

/// Identity of an artifact in a Maven-layout repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    group_id: String,
    artifact_id: String,
    version: String,
    classifier: Option<String>,
}

impl Coordinate {
    /// Builds a coordinate, normalizing a blank classifier to none.
    ///
    /// # Errors
    /// Returns [`CoordinateError::EmptyField`] when group, artifact, or version is blank.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        classifier: Option<&str>,
    ) -> Result<Self, CoordinateError> {
        let group_id = group_id.into();
        let artifact_id = artifact_id.into();
        let version = version.into();
        for (field, value) in [
            ("groupId", &group_id),
            ("artifactId", &artifact_id),
            ("version", &version),
        ] {
            if value.trim().is_empty() {
                return Err(CoordinateError::EmptyField(field));
            }
        }
        let classifier = classifier
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        Ok(Self {
            group_id,
            artifact_id,
            version,
            classifier,
        })
    }

    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    #[must_use]
    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// Versions ending in `SNAPSHOT` need metadata negotiation before they map to a file.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with(SNAPSHOT_SUFFIX)
    }

    /// `group/with/slashes/artifact/version`, without a trailing slash.
    #[must_use]
    pub fn version_directory(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version
        )
    }

    /// Canonical repository-relative path without an extension:
    /// `group/artifact/version/artifact-version[-classifier]`.
    #[must_use]
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}",
            self.version_directory(),
            self.file_stem(&self.version)
        )
    }

    /// `artifact-<version>[-classifier]`, with the version supplied by the caller so snapshot
    /// resolution can substitute a timestamped value.
    #[must_use]
    pub fn file_stem(&self, version: &str) -> String {
        match &self.classifier {
            Some(classifier) => format!("{}-{}-{}", self.artifact_id, version, classifier),
            None => format!("{}-{}", self.artifact_id, version),
        }
    }

    /// Replaces `SNAPSHOT` in the version with the given concrete value.
    #[must_use]
    pub fn timestamped_version(&self, timestamp: &str, build_number: &str) -> String {
        self.version
            .replace(SNAPSHOT_SUFFIX, &format!("{timestamp}-{build_number}"))
    }

    /// Substitutes the descriptor placeholders this resolver understands.
    #[must_use]
    pub fn interpolate(&self, value: &str) -> String {
        match value {
            "${project.groupId}" => self.group_id.clone(),
            "${project.version}" => self.version.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        match parts.as_slice() {
            [group, artifact, version] => Self::new(*group, *artifact, *version, None),
            [group, artifact, version, classifier] => {
                Self::new(*group, *artifact, *version, Some(classifier))
            }
            _ => Err(CoordinateError::Malformed(raw.to_string())),
        }
    }
}
