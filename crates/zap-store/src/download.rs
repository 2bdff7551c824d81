use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use zap_domain::Coordinate;
use zap_resolver::{HttpClient, HttpError, HttpSettings, RepositoryResolver, ResolutionError};

const CHUNK_SIZE: usize = 8 * 1024;

/// How the downloaded bytes were checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Verification {
    /// The SHA-1 digest matched the repository's checksum file.
    Verified { sha1: String },
    /// The repository offered no usable checksum; the stream completed without error.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub verification: Verification,
}

/// Why one download attempt against one repository failed. Never leaves a file behind.
#[derive(Debug, thiserror::Error)]
pub enum DownloadFailure {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("i/o error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checksum mismatch for {coordinate}: expected {expected} but found {actual}")]
    ChecksumMismatch {
        coordinate: String,
        expected: String,
        actual: String,
    },
}

impl DownloadFailure {
    /// The attempt failed because no network is available.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        match self {
            Self::Resolution(err) => err.is_offline(),
            Self::Http(err) => err.is_offline(),
            Self::Io { .. } | Self::ChecksumMismatch { .. } => false,
        }
    }
}

pub type DownloadResult = Result<DownloadedArtifact, DownloadFailure>;

/// Downloads artifacts with streaming SHA-1 verification. It never retries; falling back to
/// another repository is the caller's job.
#[derive(Debug, Clone)]
pub struct AcquisitionEngine {
    documents: HttpClient,
    artifacts: HttpClient,
}

impl AcquisitionEngine {
    /// # Errors
    /// Returns an error when an HTTP client cannot be constructed.
    pub fn new(settings: &HttpSettings) -> reqwest::Result<Self> {
        Ok(Self {
            documents: HttpClient::metadata(settings)?,
            artifacts: HttpClient::download(settings)?,
        })
    }

    /// Client used for checksum files; resolvers share it for snapshot metadata.
    #[must_use]
    pub fn documents(&self) -> &HttpClient {
        &self.documents
    }

    /// Downloads `coordinate` from the resolver's repository to `target`.
    ///
    /// The body streams into a temporary file beside `target` that is only moved into place
    /// after verification, so `target` never holds a partial or unverified artifact.
    ///
    /// # Errors
    /// Returns a [`DownloadFailure`] for resolution, transport, I/O, or checksum problems.
    pub fn download(
        &self,
        coordinate: &Coordinate,
        target: &Path,
        resolver: &dyn RepositoryResolver,
    ) -> DownloadResult {
        let result = self.download_inner(coordinate, target, resolver);
        if result.is_err() && target.exists() {
            if let Err(err) = fs::remove_file(target) {
                debug!(path = %target.display(), "cleanup after failed download: {err}");
            }
        }
        result
    }

    fn download_inner(
        &self,
        coordinate: &Coordinate,
        target: &Path,
        resolver: &dyn RepositoryResolver,
    ) -> DownloadResult {
        let parent = target
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| io_failure(parent, source))?;

        let url = resolver.resolve_artifact_url(coordinate)?;
        let expected = self.expected_checksum(coordinate, resolver);

        let mut response = self.artifacts.open(&url)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(|source| io_failure(parent, source))?;
        let mut hasher = expected.as_ref().map(|_| Sha1::new());
        let mut written: u64 = 0;
        let mut buffer = [0u8; CHUNK_SIZE];
        loop {
            let read = response.read(&mut buffer).map_err(|source| {
                DownloadFailure::Http(HttpError::Body {
                    url: url.to_string(),
                    source,
                })
            })?;
            if read == 0 {
                break;
            }
            tmp.write_all(&buffer[..read])
                .map_err(|source| io_failure(tmp.path(), source))?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&buffer[..read]);
            }
            written += read as u64;
        }
        tmp.flush().map_err(|source| io_failure(tmp.path(), source))?;

        let verification = match (expected, hasher) {
            (Some(expected), Some(hasher)) => {
                let actual = hex::encode(hasher.finalize());
                if !checksum_matches(&expected, &actual) {
                    return Err(DownloadFailure::ChecksumMismatch {
                        coordinate: coordinate.to_string(),
                        expected,
                        actual,
                    });
                }
                Verification::Verified { sha1: actual }
            }
            _ => Verification::Skipped,
        };

        tmp.persist(target)
            .map_err(|err| io_failure(target, err.error))?;
        debug!(%coordinate, %url, bytes = written, ?verification, "artifact stored");
        Ok(DownloadedArtifact {
            path: target.to_path_buf(),
            bytes: written,
            verification,
        })
    }

    /// Best-effort checksum lookup; any failure means verification is skipped.
    fn expected_checksum(
        &self,
        coordinate: &Coordinate,
        resolver: &dyn RepositoryResolver,
    ) -> Option<String> {
        let url = match resolver.resolve_checksum_url(coordinate) {
            Ok(url) => url,
            Err(err) => {
                debug!(%coordinate, "checksum url unavailable: {err}");
                return None;
            }
        };
        match self.documents.get_text(&url) {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    warn!(%coordinate, %url, "empty checksum file; skipping verification");
                    None
                } else {
                    Some(text)
                }
            }
            Err(err) => {
                debug!(%coordinate, %url, "checksum unavailable: {err}");
                None
            }
        }
    }
}

/// Accepts a bare digest, a `SHA1 (name) = <hex>` line, or a `<hex>  name` line.
fn checksum_matches(expected: &str, actual: &str) -> bool {
    let expected = expected.trim().to_ascii_lowercase();
    expected.ends_with(actual)
        || expected
            .split_whitespace()
            .next()
            .is_some_and(|first| first == actual)
}

fn io_failure(path: &Path, source: io::Error) -> DownloadFailure {
    DownloadFailure::Io {
        path: path.to_path_buf(),
        source,
    }
}
