//! Coordinate to URL resolution against one remote repository.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;
use url::Url;
use zap_domain::{Coordinate, MavenRepository, SnapshotMetadata};

use crate::http::HttpClient;
use crate::ResolutionError;

const ARTIFACT_EXTENSION: &str = "jar";
const DESCRIPTOR_EXTENSION: &str = "pom";
const CHECKSUM_SUFFIX: &str = "sha1";

/// Maps coordinates to the primary artifact, its descriptor, and its checksum file.
pub trait RepositoryResolver: Send + Sync {
    fn repository(&self) -> &MavenRepository;

    /// # Errors
    /// Fails when snapshot metadata cannot be fetched, parsed, or matched.
    fn resolve_artifact_url(&self, coordinate: &Coordinate) -> Result<Url, ResolutionError>;

    /// # Errors
    /// Fails when snapshot metadata cannot be fetched, parsed, or matched.
    fn resolve_descriptor_url(&self, coordinate: &Coordinate) -> Result<Url, ResolutionError>;

    /// # Errors
    /// Fails when snapshot metadata cannot be fetched, parsed, or matched.
    fn resolve_checksum_url(&self, coordinate: &Coordinate) -> Result<Url, ResolutionError>;
}

/// Maven-layout resolution. Release coordinates are pure string concatenation; snapshot
/// coordinates first negotiate `maven-metadata.xml`, memoised per coordinate.
#[derive(Debug)]
pub struct MavenResolver {
    repository: MavenRepository,
    http: HttpClient,
    metadata: Mutex<HashMap<Coordinate, Arc<SnapshotMetadata>>>,
}

impl MavenResolver {
    #[must_use]
    pub fn new(repository: MavenRepository, http: HttpClient) -> Self {
        Self {
            repository,
            http,
            metadata: Mutex::new(HashMap::new()),
        }
    }

    fn snapshot_metadata(
        &self,
        coordinate: &Coordinate,
    ) -> Result<Arc<SnapshotMetadata>, ResolutionError> {
        if let Some(cached) = self.cached_metadata(coordinate) {
            return Ok(cached);
        }
        let url = self.repository.snapshot_metadata_url(coordinate)?;
        let body = self
            .http
            .get_text(&url)
            .map_err(|source| ResolutionError::MetadataFetch {
                coordinate: coordinate.to_string(),
                source,
            })?;
        let metadata = SnapshotMetadata::parse(&body).map_err(|source| {
            ResolutionError::MalformedMetadata {
                url: url.to_string(),
                source,
            }
        })?;
        debug!(
            %coordinate,
            repository = %self.repository,
            entries = metadata.versions.len(),
            "parsed snapshot metadata"
        );
        let metadata = Arc::new(metadata);
        if let Ok(mut guard) = self.metadata.lock() {
            guard.insert(coordinate.clone(), Arc::clone(&metadata));
        }
        Ok(metadata)
    }

    fn cached_metadata(&self, coordinate: &Coordinate) -> Option<Arc<SnapshotMetadata>> {
        self.metadata
            .lock()
            .ok()
            .and_then(|guard| guard.get(coordinate).cloned())
    }

    fn snapshot_url(&self, coordinate: &Coordinate, extension: &str) -> Result<Url, ResolutionError> {
        let metadata = self.snapshot_metadata(coordinate)?;
        let version = metadata
            .resolve_version(coordinate, extension)
            .ok_or_else(|| ResolutionError::NoSnapshotVersion {
                coordinate: coordinate.to_string(),
                extension: extension.to_string(),
                repository: self.repository.to_string(),
            })?;
        let url = self.repository.snapshot_url(coordinate, &version, extension)?;
        debug!(%coordinate, %url, "resolved snapshot file");
        Ok(url)
    }

    fn file_url(&self, coordinate: &Coordinate, extension: &str) -> Result<Url, ResolutionError> {
        if coordinate.is_snapshot() {
            self.snapshot_url(coordinate, extension)
        } else {
            Ok(self.repository.release_url(coordinate, extension)?)
        }
    }
}

impl RepositoryResolver for MavenResolver {
    fn repository(&self) -> &MavenRepository {
        &self.repository
    }

    fn resolve_artifact_url(&self, coordinate: &Coordinate) -> Result<Url, ResolutionError> {
        self.file_url(coordinate, ARTIFACT_EXTENSION)
    }

    fn resolve_descriptor_url(&self, coordinate: &Coordinate) -> Result<Url, ResolutionError> {
        self.file_url(coordinate, DESCRIPTOR_EXTENSION)
    }

    fn resolve_checksum_url(&self, coordinate: &Coordinate) -> Result<Url, ResolutionError> {
        if coordinate.is_snapshot() {
            let artifact = self.snapshot_url(coordinate, ARTIFACT_EXTENSION)?;
            let joined = format!("{artifact}.{CHECKSUM_SUFFIX}");
            return Url::parse(&joined).map_err(|err| {
                ResolutionError::InvalidUrl(zap_domain::RepositoryUrlError {
                    url: joined,
                    reason: err.to_string(),
                })
            });
        }
        Ok(self
            .repository
            .release_url(coordinate, &format!("{ARTIFACT_EXTENSION}.{CHECKSUM_SUFFIX}"))?)
    }
}
