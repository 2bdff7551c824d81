//! Code-loading targets and the strategy that picks one.
//!
//! A host may offer a specialized loading facility. It is probed once; any probe failure
//! falls through to the generic loader. How a kind of loader is augmented is resolved once per
//! kind and cached; it is bound to each host's own loader on every selection.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

const ARCHIVE_MAGIC: [&[u8; 4]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("{kind} loader is unavailable: {reason}")]
    Unavailable { kind: String, reason: String },
    #[error("{} is not a code archive", .path.display())]
    NotAnArchive { path: PathBuf },
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Accepts local archive paths, one call per path. Repeated paths are no-ops.
pub trait CodeLoadingTarget: Send + Sync {
    /// # Errors
    /// Fails when `path` cannot be opened as a code archive or the loader rejects it.
    fn add_code_unit(&self, path: &Path) -> Result<(), LoaderError>;
}

/// How loaders of one kind accept new archives, applied to a particular host's loader.
pub type GenericBinder =
    Arc<dyn Fn(&dyn LoaderHost) -> Result<Arc<dyn CodeLoadingTarget>, LoaderError> + Send + Sync>;

/// Binds to whatever [`LoaderHost::generic_loader`] returns, unchanged.
#[must_use]
pub fn direct_binder() -> GenericBinder {
    Arc::new(|host: &dyn LoaderHost| host.generic_loader())
}

/// The environment a resolution loads code into.
pub trait LoaderHost {
    /// Looks for the preferred loading facility. `Ok(None)` and errors both mean "absent".
    ///
    /// # Errors
    /// Any error is logged and treated as absence.
    fn probe_specialized(&self) -> Result<Option<Arc<dyn CodeLoadingTarget>>, LoaderError>;

    /// Identity of the concrete generic loader type, used as the cache key.
    fn loader_kind(&self) -> String;

    /// Looks up how loaders of this kind are augmented. Called at most once per kind per
    /// [`GenericLoaderCache`].
    ///
    /// # Errors
    /// Fails when loaders of this kind cannot be augmented at all.
    fn generic_binder(&self) -> Result<GenericBinder, LoaderError> {
        Ok(direct_binder())
    }

    /// This host's own generic loader.
    ///
    /// # Errors
    /// Fails when the host has no loader that can be augmented.
    fn generic_loader(&self) -> Result<Arc<dyn CodeLoadingTarget>, LoaderError>;
}

/// Generic loader binders resolved so far, keyed by [`LoaderHost::loader_kind`].
#[derive(Default)]
pub struct GenericLoaderCache {
    entries: Mutex<HashMap<String, GenericBinder>>,
}

impl GenericLoaderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn binder_for(&self, host: &dyn LoaderHost, kind: &str) -> Result<GenericBinder, LoaderError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(binder) = entries.get(kind) {
            return Ok(Arc::clone(binder));
        }
        let binder = host.generic_binder()?;
        debug!(kind, "resolved generic loader binder");
        entries.insert(kind.to_string(), Arc::clone(&binder));
        Ok(binder)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for GenericLoaderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericLoaderCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[derive(Clone)]
pub enum LoaderStrategy {
    Specialized(Arc<dyn CodeLoadingTarget>),
    Generic {
        kind: String,
        target: Arc<dyn CodeLoadingTarget>,
    },
}

impl LoaderStrategy {
    /// Probes `host` once. Probe errors and panics never escape; only a missing generic
    /// loader is an error.
    ///
    /// The generic binder is looked up once per loader kind but is bound to `host` on every
    /// call, so hosts sharing a kind never share a target.
    ///
    /// # Errors
    /// Returns the generic loader's resolution error when the probe found nothing.
    pub fn select(host: &dyn LoaderHost, cache: &GenericLoaderCache) -> Result<Self, LoaderError> {
        match panic::catch_unwind(AssertUnwindSafe(|| host.probe_specialized())) {
            Ok(Ok(Some(target))) => {
                info!("using specialized library loader");
                return Ok(Self::Specialized(target));
            }
            Ok(Ok(None)) => debug!("no specialized library loader"),
            Ok(Err(err)) => warn!("specialized library loader unusable: {err}"),
            Err(_) => warn!("specialized library loader probe panicked"),
        }
        let kind = host.loader_kind();
        let binder = cache.binder_for(host, &kind)?;
        let target = binder(host)?;
        info!(kind = %kind, "using generic loader");
        Ok(Self::Generic { kind, target })
    }

    #[must_use]
    pub fn target(&self) -> &dyn CodeLoadingTarget {
        match self {
            Self::Specialized(target) | Self::Generic { target, .. } => target.as_ref(),
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Specialized(_) => "specialized".to_string(),
            Self::Generic { kind, .. } => format!("generic ({kind})"),
        }
    }
}

impl std::fmt::Debug for LoaderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Opens `path` and checks for a zip header.
///
/// # Errors
/// Fails when the file cannot be read or is not a zip archive.
pub fn verify_archive(path: &Path) -> Result<(), LoaderError> {
    let io_error = |source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut header = [0u8; 4];
    let mut file = File::open(path).map_err(io_error)?;
    let read = file.read(&mut header).map_err(io_error)?;
    if read == header.len() && ARCHIVE_MAGIC.iter().any(|magic| **magic == header) {
        Ok(())
    } else {
        Err(LoaderError::NotAnArchive {
            path: path.to_path_buf(),
        })
    }
}

/// Specialized target: a host library-loader manifest, one archive path per line.
#[derive(Debug)]
pub struct ManifestTarget {
    manifest: PathBuf,
    listed: Mutex<HashSet<PathBuf>>,
}

impl ManifestTarget {
    /// Opens an existing or new manifest, verifying it is writable.
    ///
    /// # Errors
    /// Fails when the manifest cannot be read or opened for appending.
    pub fn open(manifest: impl Into<PathBuf>) -> Result<Self, LoaderError> {
        let manifest = manifest.into();
        let io_error = |source| LoaderError::Io {
            path: manifest.clone(),
            source,
        };
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&manifest)
            .map_err(io_error)?;
        let listed = fs::read_to_string(&manifest)
            .map_err(io_error)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        Ok(Self {
            manifest,
            listed: Mutex::new(listed),
        })
    }

    #[must_use]
    pub fn manifest(&self) -> &Path {
        &self.manifest
    }
}

impl CodeLoadingTarget for ManifestTarget {
    fn add_code_unit(&self, path: &Path) -> Result<(), LoaderError> {
        verify_archive(path)?;
        let mut listed = self.listed.lock().unwrap_or_else(PoisonError::into_inner);
        if listed.contains(path) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.manifest)
            .map_err(|source| LoaderError::Io {
                path: self.manifest.clone(),
                source,
            })?;
        writeln!(file, "{}", path.display()).map_err(|source| LoaderError::Io {
            path: self.manifest.clone(),
            source,
        })?;
        listed.insert(path.to_path_buf());
        info!(path = %path.display(), manifest = %self.manifest.display(), "added to library loader");
        Ok(())
    }
}

/// Generic target that records accepted archives in order for the caller to report.
#[derive(Debug, Default)]
pub struct CollectingTarget {
    paths: Mutex<Vec<PathBuf>>,
}

impl CollectingTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CodeLoadingTarget for CollectingTarget {
    fn add_code_unit(&self, path: &Path) -> Result<(), LoaderError> {
        verify_archive(path)?;
        let mut paths = self.paths.lock().unwrap_or_else(PoisonError::into_inner);
        if !paths.iter().any(|existing| existing == path) {
            paths.push(path.to_path_buf());
            info!(path = %path.display(), "added to generic loader");
        }
        Ok(())
    }
}
