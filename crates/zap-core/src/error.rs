use std::fmt;
use std::io;
use std::path::PathBuf;

use zap_domain::{Coordinate, MavenRepository};
use zap_store::DownloadFailure;

use crate::loader::LoaderError;
use crate::relocation::RelocationFailure;

/// One repository's answer for a dependency that could not be downloaded.
#[derive(Debug)]
pub struct RepositoryAttempt {
    pub repository: MavenRepository,
    pub failure: DownloadFailure,
}

/// Every configured repository was tried for `coordinate` and none delivered it.
#[derive(Debug, thiserror::Error)]
#[error("could not download {coordinate} from any repository{}", AttemptList(.attempts))]
pub struct DependencyDownloadError {
    pub coordinate: Coordinate,
    pub attempts: Vec<RepositoryAttempt>,
}

impl DependencyDownloadError {
    /// True when at least one repository was tried and every attempt failed for lack of network.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|attempt| attempt.failure.is_offline())
    }
}

struct AttemptList<'a>(&'a [RepositoryAttempt]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(" (no repositories configured)");
        }
        f.write_str(":")?;
        for attempt in self.0 {
            write!(f, "\n  - {}: {}", attempt.repository, attempt.failure)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Download(#[from] DependencyDownloadError),
    #[error(transparent)]
    Relocation(#[from] RelocationFailure),
    #[error("failed to stage {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: LoaderError,
    },
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("failed to prepare cache directory {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to initialise HTTP clients: {0}")]
    Http(#[from] reqwest::Error),
}
