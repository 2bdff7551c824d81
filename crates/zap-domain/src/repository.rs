use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Coordinate;

pub const MAVEN_CENTRAL_URL: &str = "https://repo1.maven.org/maven2/";
pub const JITPACK_URL: &str = "https://jitpack.io/";
pub const MINECRAFT_URL: &str = "https://libraries.minecraft.net/";
pub const PAPER_URL: &str = "https://papermc.io/repo/repository/maven-public/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository url `{url}`: {reason}")]
pub struct RepositoryUrlError {
    pub url: String,
    pub reason: String,
}

/// A remote Maven-layout repository identified by its base URL.
///
/// The base always ends with `/`; equality and hashing use the normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MavenRepository {
    base: Url,
}

impl MavenRepository {
    /// # Errors
    /// Returns an error when the string is not an absolute URL.
    pub fn new(raw: &str) -> Result<Self, RepositoryUrlError> {
        let trimmed = raw.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        let base = Url::parse(&normalized).map_err(|err| RepositoryUrlError {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(RepositoryUrlError {
                url: raw.to_string(),
                reason: "url cannot be used as a base".into(),
            });
        }
        Ok(Self { base })
    }

    #[must_use]
    pub fn maven_central() -> Self {
        Self::well_known(MAVEN_CENTRAL_URL)
    }

    #[must_use]
    pub fn jitpack() -> Self {
        Self::well_known(JITPACK_URL)
    }

    #[must_use]
    pub fn minecraft() -> Self {
        Self::well_known(MINECRAFT_URL)
    }

    #[must_use]
    pub fn paper() -> Self {
        Self::well_known(PAPER_URL)
    }

    /// Only ever called with the `*_URL` constants above, which
    /// `well_known_repositories_are_valid_bases` checks.
    fn well_known(url: &'static str) -> Self {
        Self {
            base: Url::parse(url).expect("well-known repository url is valid"),
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.base
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }

    /// Joins a repository-relative path onto the base.
    ///
    /// # Errors
    /// Returns an error when the joined string is not a valid URL.
    pub fn join(&self, relative: &str) -> Result<Url, RepositoryUrlError> {
        let joined = format!("{}{}", self.base.as_str(), relative);
        Url::parse(&joined).map_err(|err| RepositoryUrlError {
            url: joined,
            reason: err.to_string(),
        })
    }

    /// Release-layout URL of a coordinate's file with the given extension, e.g. `jar`.
    ///
    /// # Errors
    /// Returns an error when the joined string is not a valid URL.
    pub fn release_url(
        &self,
        coordinate: &Coordinate,
        extension: &str,
    ) -> Result<Url, RepositoryUrlError> {
        self.join(&format!("{}.{extension}", coordinate.repository_path()))
    }

    /// Location of `maven-metadata.xml` inside the coordinate's version directory.
    ///
    /// # Errors
    /// Returns an error when the joined string is not a valid URL.
    pub fn snapshot_metadata_url(&self, coordinate: &Coordinate) -> Result<Url, RepositoryUrlError> {
        self.join(&format!(
            "{}/maven-metadata.xml",
            coordinate.version_directory()
        ))
    }

    /// URL of a snapshot file whose name carries `concrete_version` while the directory keeps
    /// the literal `SNAPSHOT` version.
    ///
    /// # Errors
    /// Returns an error when the joined string is not a valid URL.
    pub fn snapshot_url(
        &self,
        coordinate: &Coordinate,
        concrete_version: &str,
        extension: &str,
    ) -> Result<Url, RepositoryUrlError> {
        self.join(&format!(
            "{}/{}.{extension}",
            coordinate.version_directory(),
            coordinate.file_stem(concrete_version)
        ))
    }
}

impl fmt::Display for MavenRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str())
    }
}

impl TryFrom<String> for MavenRepository {
    type Error = RepositoryUrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<MavenRepository> for String {
    fn from(value: MavenRepository) -> Self {
        value.base.into()
    }
}
