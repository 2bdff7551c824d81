use zap_domain::{DescriptorError, MetadataError, RepositoryUrlError};

use crate::http::HttpError;

/// Coordinate-to-URL mapping or descriptor discovery failed.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    InvalidUrl(#[from] RepositoryUrlError),
    #[error("error fetching snapshot metadata for {coordinate}: {source}")]
    MetadataFetch {
        coordinate: String,
        #[source]
        source: HttpError,
    },
    #[error("snapshot metadata at {url} is malformed: {source}")]
    MalformedMetadata {
        url: String,
        #[source]
        source: MetadataError,
    },
    #[error("no snapshot version of {coordinate} with extension `{extension}` in {repository}")]
    NoSnapshotVersion {
        coordinate: String,
        extension: String,
        repository: String,
    },
    #[error("error fetching descriptor of {coordinate}: {source}")]
    DescriptorFetch {
        coordinate: String,
        #[source]
        source: HttpError,
    },
    #[error("descriptor of {coordinate} not found in any of the following repositories: {repositories}")]
    DescriptorNotFound {
        coordinate: String,
        repositories: String,
    },
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("transitive expansion of {root} exceeded {limit} descriptors")]
    ExpansionLimit { root: String, limit: usize },
}

impl ResolutionError {
    /// The failure means the file is absent from this repository, not that the lookup broke.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::MetadataFetch { source, .. } | Self::DescriptorFetch { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        match self {
            Self::MetadataFetch { source, .. } | Self::DescriptorFetch { source, .. } => {
                source.is_offline()
            }
            _ => false,
        }
    }
}
