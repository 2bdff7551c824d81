//! Resolution orchestration: turns declared dependencies into staged, loadable archives.

mod config;
mod error;
mod loader;
mod manager;
mod outcome;
mod relocation;

pub use config::{
    Config, CACHE_PATH_ENV, DOWNLOADS_ENV, HTTP_TIMEOUT_ENV, KEEP_PROXIES_ENV,
    LIBRARY_LOADER_ENV, MAX_TRANSITIVE_ENV, ONLINE_ENV,
};
pub use error::{DependencyDownloadError, OrchestratorError, RepositoryAttempt};
pub use loader::{
    direct_binder, verify_archive, CodeLoadingTarget, CollectingTarget, GenericBinder,
    GenericLoaderCache, LoaderError, LoaderHost, LoaderStrategy, ManifestTarget,
};
pub use manager::DependencyManager;
pub use outcome::{DependencyReport, DependencyState, ResolutionOutcome, ResolutionReport};
pub use relocation::{CommandRelocator, RelocationFailure, Relocator};
pub use zap_domain::ConfigError;
