//! Resolution orchestrator: cache check, repository fallback, relocation, staging.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;

use indexmap::IndexMap;
use tracing::{info, warn};
use zap_domain::{Coordinate, DeclaredConfig, MavenRepository, RelocationRules, RepositorySet};
use zap_resolver::{HttpSettings, MavenResolver};
use zap_store::{resolve_cache_root, AcquisitionEngine, CacheLayout, DownloadedArtifact};

use crate::config::{download_concurrency, Config};
use crate::error::{DependencyDownloadError, OrchestratorError, RepositoryAttempt};
use crate::loader::{GenericLoaderCache, LoaderHost, LoaderStrategy};
use crate::outcome::{DependencyReport, DependencyState, ResolutionOutcome, ResolutionReport};
use crate::relocation::{RelocationFailure, Relocator};

/// A successful fetch and the repository that served it.
struct Acquired {
    repository: MavenRepository,
    artifact: DownloadedArtifact,
}

type JobResult = Result<Acquired, DependencyDownloadError>;

/// Declared dependencies, the repositories to fetch them from, and the relocation rules to
/// apply before they are staged.
pub struct DependencyManager {
    dependencies: Vec<Coordinate>,
    repositories: RepositorySet,
    relocations: RelocationRules,
    cache: CacheLayout,
    network: HttpSettings,
    download_workers: Option<usize>,
    relocator: Option<Arc<dyn Relocator>>,
}

impl DependencyManager {
    /// A manager caching into `cache_root`, searching Maven Central first.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            dependencies: Vec::new(),
            repositories: RepositorySet::with_central(),
            relocations: RelocationRules::default(),
            cache: CacheLayout::new(cache_root),
            network: HttpSettings::default(),
            download_workers: None,
            relocator: None,
        }
    }

    /// Builds a manager from a declared configuration directory's contents. The cache root is
    /// `ZAP_CACHE_PATH` when set, otherwise `<data_dir>/<libs-folder>`.
    ///
    /// # Errors
    /// Fails when the cache root cannot be made absolute.
    pub fn from_declared(
        declared: &DeclaredConfig,
        config: &Config,
        data_dir: &Path,
    ) -> Result<Self, OrchestratorError> {
        let location = resolve_cache_root(
            config.cache_path().map(PathBuf::as_path),
            data_dir,
            &declared.libs_folder,
        )
        .map_err(|source| OrchestratorError::Cache {
            path: data_dir.join(&declared.libs_folder),
            source,
        })?;
        info!(cache = %location.path.display(), source = location.source, "cache root");
        let mut manager = Self::new(location.path)
            .network(*config.network())
            .download_workers(config.downloads());
        for dependency in &declared.dependencies {
            manager.dependency(dependency.clone());
        }
        for repository in &declared.repositories {
            manager.repository(repository.clone());
        }
        for rule in declared.relocations.iter() {
            manager.relocate(rule.clone());
        }
        Ok(manager)
    }

    pub fn dependency(&mut self, coordinate: Coordinate) {
        self.dependencies.push(coordinate);
    }

    /// Appends a repository; one already present keeps its position.
    pub fn repository(&mut self, repository: MavenRepository) {
        self.repositories.insert(repository);
    }

    pub fn relocate(&mut self, rule: zap_domain::RelocationRule) {
        self.relocations.push(rule);
    }

    #[must_use]
    pub fn network(mut self, network: HttpSettings) -> Self {
        self.network = network;
        self
    }

    #[must_use]
    pub fn download_workers(mut self, workers: Option<usize>) -> Self {
        self.download_workers = workers;
        self
    }

    #[must_use]
    pub fn relocator(mut self, relocator: Arc<dyn Relocator>) -> Self {
        self.relocator = Some(relocator);
        self
    }

    #[must_use]
    pub fn has_relocations(&self) -> bool {
        !self.relocations.is_empty()
    }

    #[must_use]
    pub fn dependencies(&self) -> &[Coordinate] {
        &self.dependencies
    }

    #[must_use]
    pub fn repositories(&self) -> &RepositorySet {
        &self.repositories
    }

    #[must_use]
    pub fn cache(&self) -> &CacheLayout {
        &self.cache
    }

    /// Resolves every declared dependency and hands the staged archives, in declaration
    /// order, to the loader selected for `host`.
    pub fn load(&self, host: &dyn LoaderHost, loaders: &GenericLoaderCache) -> ResolutionOutcome {
        let mut reports: Vec<DependencyReport> = self
            .dependencies
            .iter()
            .cloned()
            .map(DependencyReport::new)
            .collect();
        let outcome = self.run(&mut reports, host, loaders);
        info!(
            total = self.dependencies.len(),
            "dependency resolution finished"
        );
        let report = ResolutionReport {
            cache_root: self.cache.root().to_path_buf(),
            loader: None,
            dependencies: reports,
        };
        match outcome {
            Ok(loader) => ResolutionOutcome::Ok(ResolutionReport {
                loader: Some(loader),
                ..report
            }),
            Err(OrchestratorError::Download(err)) if err.is_offline() => {
                info!("no network connection; connect at least once so libraries can be cached");
                ResolutionOutcome::Degraded {
                    reason: err.to_string(),
                    report,
                }
            }
            Err(err) => ResolutionOutcome::Fatal(err),
        }
    }

    fn run(
        &self,
        reports: &mut [DependencyReport],
        host: &dyn LoaderHost,
        loaders: &GenericLoaderCache,
    ) -> Result<String, OrchestratorError> {
        fs::create_dir_all(self.cache.root()).map_err(|source| OrchestratorError::Cache {
            path: self.cache.root().to_path_buf(),
            source,
        })?;

        let mut jobs: IndexMap<PathBuf, Coordinate> = IndexMap::new();
        for report in reports.iter_mut() {
            let coordinate = &report.coordinate;
            info!(%coordinate, "resolving dependency");
            let relocated = self.cache.relocated_path(coordinate);
            let artifact = self.cache.artifact_path(coordinate);
            if self.has_relocations() && relocated.exists() {
                info!(%coordinate, path = %relocated.display(), "using existing relocated archive");
                report.cache_hit = true;
                report.relocated = true;
                report.path = Some(relocated);
                report.advance(DependencyState::CacheHit);
            } else if artifact.exists() {
                info!(%coordinate, path = %artifact.display(), "using cached archive");
                report.cache_hit = true;
                report.path = Some(artifact);
                report.advance(DependencyState::CacheHit);
            } else {
                jobs.entry(artifact)
                    .or_insert_with(|| coordinate.clone());
                report.advance(DependencyState::Downloading);
            }
        }

        let mut results = self.download_all(jobs)?;
        for report in reports.iter_mut() {
            if report.state != DependencyState::Downloading {
                continue;
            }
            let path = self.cache.artifact_path(&report.coordinate);
            match results.get(&path) {
                Some(Ok(acquired)) => {
                    report.repository = Some(acquired.repository.to_string());
                    report.verification = Some(acquired.artifact.verification.clone());
                    report.path = Some(acquired.artifact.path.clone());
                    report.advance(DependencyState::Downloaded);
                }
                _ => {
                    report.advance(DependencyState::Failed);
                    let err = match results.remove(&path) {
                        Some(Err(err)) => err,
                        _ => DependencyDownloadError {
                            coordinate: report.coordinate.clone(),
                            attempts: Vec::new(),
                        },
                    };
                    return Err(err.into());
                }
            }
        }

        let mut staged = Vec::with_capacity(reports.len());
        for report in reports.iter_mut() {
            let path = if self.has_relocations() && !report.relocated {
                self.relocate_one(report)?
            } else {
                report
                    .path
                    .clone()
                    .unwrap_or_else(|| self.cache.artifact_path(&report.coordinate))
            };
            staged.push(path);
        }

        let strategy = LoaderStrategy::select(host, loaders)?;
        let target = strategy.target();
        for (report, path) in reports.iter_mut().zip(&staged) {
            target
                .add_code_unit(path)
                .map_err(|source| OrchestratorError::Staging {
                    path: path.clone(),
                    source,
                })?;
            report.advance(DependencyState::Staged);
        }
        Ok(strategy.describe())
    }

    fn relocate_one(&self, report: &mut DependencyReport) -> Result<PathBuf, OrchestratorError> {
        let coordinate = report.coordinate.clone();
        let input = self.cache.artifact_path(&coordinate);
        let output = self.cache.relocated_path(&coordinate);
        // An earlier duplicate declaration may already have relocated this archive.
        if output.exists() {
            report.relocated = true;
            report.path = Some(output.clone());
            return Ok(output);
        }
        let Some(relocator) = self.relocator.as_ref() else {
            report.advance(DependencyState::Failed);
            return Err(RelocationFailure::Unavailable {
                coordinate: coordinate.to_string(),
            }
            .into());
        };
        report.advance(DependencyState::Relocating);
        if let Err(err) = relocator.relocate(&coordinate, &input, &output, &self.relocations) {
            report.advance(DependencyState::Failed);
            remove_best_effort(&output);
            return Err(err.into());
        }
        let bytes = fs::metadata(&output).map(|meta| meta.len()).unwrap_or(0);
        info!(%coordinate, path = %output.display(), bytes, "relocated");
        remove_best_effort(&input);
        report.relocated = true;
        report.path = Some(output.clone());
        report.advance(DependencyState::Relocated);
        Ok(output)
    }

    /// Downloads each unique cache path once, concurrently.
    fn download_all(
        &self,
        jobs: IndexMap<PathBuf, Coordinate>,
    ) -> Result<HashMap<PathBuf, JobResult>, OrchestratorError> {
        if jobs.is_empty() {
            return Ok(HashMap::new());
        }
        let engine = AcquisitionEngine::new(&self.network)?;
        let resolvers: Vec<MavenResolver> = self
            .repositories
            .iter()
            .map(|repository| MavenResolver::new(repository.clone(), engine.documents().clone()))
            .collect();

        let worker_count = download_concurrency(jobs.len(), self.download_workers);
        let (job_tx, job_rx) = mpsc::channel();
        for job in jobs {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);
        let job_rx = Mutex::new(job_rx);
        let (result_tx, result_rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..worker_count {
                let work_rx = &job_rx;
                let result_tx = result_tx.clone();
                let engine = &engine;
                let resolvers = &resolvers;
                scope.spawn(move || loop {
                    let next = work_rx
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .recv();
                    let Ok((path, coordinate)) = next else {
                        break;
                    };
                    let outcome = fetch_from_repositories(engine, resolvers, &coordinate, &path);
                    if result_tx.send((path, outcome)).is_err() {
                        break;
                    }
                });
            }
        });
        drop(result_tx);
        Ok(result_rx.into_iter().collect())
    }
}

/// Tries each repository in order; the first success wins.
fn fetch_from_repositories(
    engine: &AcquisitionEngine,
    resolvers: &[MavenResolver],
    coordinate: &Coordinate,
    target: &Path,
) -> JobResult {
    use zap_resolver::RepositoryResolver as _;

    let mut attempts = Vec::new();
    for resolver in resolvers {
        let repository = resolver.repository();
        info!(%coordinate, %repository, "attempting download");
        match engine.download(coordinate, target, resolver) {
            Ok(artifact) => {
                info!(
                    %coordinate,
                    %repository,
                    bytes = artifact.bytes,
                    verification = ?artifact.verification,
                    "downloaded"
                );
                return Ok(Acquired {
                    repository: repository.clone(),
                    artifact,
                });
            }
            Err(failure) => {
                warn!(%coordinate, %repository, "download failed: {failure}");
                attempts.push(RepositoryAttempt {
                    repository: repository.clone(),
                    failure,
                });
            }
        }
    }
    Err(DependencyDownloadError {
        coordinate: coordinate.clone(),
        attempts,
    })
}

fn remove_best_effort(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "failed to remove: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{CodeLoadingTarget, CollectingTarget, LoaderError};
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use sha1::{Digest, Sha1};
    use zap_domain::RelocationRule;

    const JAR: &[u8] = b"PK\x03\x04 library bytes";

    struct TestHost {
        target: Arc<CollectingTarget>,
    }

    impl TestHost {
        fn new() -> Self {
            Self {
                target: Arc::new(CollectingTarget::new()),
            }
        }
    }

    impl LoaderHost for TestHost {
        fn probe_specialized(&self) -> Result<Option<Arc<dyn CodeLoadingTarget>>, LoaderError> {
            Ok(None)
        }

        fn loader_kind(&self) -> String {
            "test".into()
        }

        fn generic_loader(&self) -> Result<Arc<dyn CodeLoadingTarget>, LoaderError> {
            Ok(self.target.clone())
        }
    }

    /// Copies the input and appends the rules, standing in for a bytecode rewriter.
    struct AppendingRelocator;

    impl Relocator for AppendingRelocator {
        fn relocate(
            &self,
            _coordinate: &Coordinate,
            input: &Path,
            output: &Path,
            rules: &RelocationRules,
        ) -> Result<(), RelocationFailure> {
            let mut bytes = fs::read(input).unwrap();
            for rule in rules.iter() {
                bytes.extend_from_slice(format!(" {rule}").as_bytes());
            }
            fs::write(output, bytes).unwrap();
            Ok(())
        }
    }

    fn sha1_hex(bytes: &[u8]) -> String {
        hex::encode(Sha1::digest(bytes))
    }

    fn serve_artifact(server: &Server, prefix: &str, times: usize) {
        let path = format!("{prefix}/com/example/lib/1.0/lib-1.0.jar");
        server.expect(
            Expectation::matching(request::method_path("GET", path.clone()))
                .times(times)
                .respond_with(status_code(200).body(JAR)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", format!("{path}.sha1")))
                .times(times)
                .respond_with(status_code(200).body(sha1_hex(JAR))),
        );
    }

    fn manager_for(cache: &Path, repositories: &[String]) -> DependencyManager {
        let mut manager = DependencyManager::new(cache);
        manager.repositories = RepositorySet::empty();
        for repository in repositories {
            manager.repository(MavenRepository::new(repository).unwrap());
        }
        manager.dependency("com.example:lib:1.0".parse().unwrap());
        manager
    }

    fn expect_ok(outcome: ResolutionOutcome) -> ResolutionReport {
        match outcome {
            ResolutionOutcome::Ok(report) => report,
            ResolutionOutcome::Degraded { reason, .. } => panic!("degraded: {reason}"),
            ResolutionOutcome::Fatal(err) => panic!("fatal: {err}"),
        }
    }

    #[test]
    fn downloads_once_and_stages_in_order() {
        let server = Server::run();
        serve_artifact(&server, "/repo", 1);
        let temp = tempfile::tempdir().unwrap();
        let manager = manager_for(temp.path(), &[server.url_str("/repo")]);
        let host = TestHost::new();
        let loaders = GenericLoaderCache::new();

        let report = expect_ok(manager.load(&host, &loaders));
        let expected = temp.path().join("com.example.lib-1.0.jar");
        assert_eq!(fs::read(&expected).unwrap(), JAR);
        assert_eq!(host.target.paths(), vec![expected.clone()]);
        assert_eq!(report.staged_paths().collect::<Vec<_>>(), vec![expected.as_path()]);
        let dep = &report.dependencies[0];
        assert_eq!(
            dep.history,
            vec![
                DependencyState::Pending,
                DependencyState::Downloading,
                DependencyState::Downloaded,
                DependencyState::Staged,
            ]
        );
        assert_eq!(dep.repository.as_deref(), Some(server.url_str("/repo/").as_str()));
        assert_eq!(report.loader.as_deref(), Some("generic (test)"));

        // Second run: the server only accepts one request per path.
        let second = TestHost::new();
        let report = expect_ok(manager.load(&second, &loaders));
        assert_eq!(second.target.paths(), vec![expected]);
        assert!(report.dependencies[0].cache_hit);
        assert_eq!(report.downloaded(), 0);
    }

    #[test]
    fn falls_back_to_next_repository() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::path(matches("^/broken/")))
                .times(2)
                .respond_with(status_code(404)),
        );
        serve_artifact(&server, "/good", 1);
        let temp = tempfile::tempdir().unwrap();
        let manager = manager_for(
            temp.path(),
            &[server.url_str("/broken"), server.url_str("/good")],
        );

        let report = expect_ok(manager.load(&TestHost::new(), &GenericLoaderCache::new()));
        assert_eq!(
            report.dependencies[0].repository.as_deref(),
            Some(server.url_str("/good/").as_str())
        );
    }

    #[test]
    fn exhausting_repositories_is_fatal_and_names_each() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method("GET"))
                .times(4)
                .respond_with(status_code(404)),
        );
        let temp = tempfile::tempdir().unwrap();
        let manager = manager_for(temp.path(), &[server.url_str("/a"), server.url_str("/b")]);
        let host = TestHost::new();

        match manager.load(&host, &GenericLoaderCache::new()) {
            ResolutionOutcome::Fatal(OrchestratorError::Download(err)) => {
                assert_eq!(err.attempts.len(), 2);
                let message = err.to_string();
                assert!(message.contains(&server.url_str("/a/")));
                assert!(message.contains(&server.url_str("/b/")));
            }
            other => panic!("expected fatal download error, got {other:?}"),
        }
        assert!(host.target.paths().is_empty());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn offline_network_degrades_without_staging() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager_for(temp.path(), &["https://repo.example/maven".to_string()])
            .network(HttpSettings {
                online: false,
                ..HttpSettings::default()
            });
        let host = TestHost::new();

        match manager.load(&host, &GenericLoaderCache::new()) {
            ResolutionOutcome::Degraded { reason, report } => {
                assert!(reason.contains("com.example:lib:1.0"));
                assert_eq!(report.staged_paths().count(), 0);
                assert_eq!(report.dependencies[0].state, DependencyState::Failed);
            }
            other => panic!("expected degraded outcome, got {other:?}"),
        }
        assert!(host.target.paths().is_empty());
    }

    #[test]
    fn relocation_replaces_original_and_short_circuits_next_run() {
        let server = Server::run();
        serve_artifact(&server, "/repo", 1);
        let temp = tempfile::tempdir().unwrap();
        let mut manager = manager_for(temp.path(), &[server.url_str("/repo")])
            .relocator(Arc::new(AppendingRelocator));
        manager.relocate(RelocationRule::new("com.example", "my.plugin.libs"));

        let report = expect_ok(manager.load(&TestHost::new(), &GenericLoaderCache::new()));
        let relocated = temp.path().join("com.example.lib-1.0-relocated.jar");
        assert!(!temp.path().join("com.example.lib-1.0.jar").exists());
        assert!(fs::read_to_string(&relocated)
            .unwrap()
            .ends_with(" com.example=my.plugin.libs"));
        assert_eq!(
            report.dependencies[0].history,
            vec![
                DependencyState::Pending,
                DependencyState::Downloading,
                DependencyState::Downloaded,
                DependencyState::Relocating,
                DependencyState::Relocated,
                DependencyState::Staged,
            ]
        );

        let host = TestHost::new();
        let report = expect_ok(manager.load(&host, &GenericLoaderCache::new()));
        assert_eq!(host.target.paths(), vec![relocated]);
        assert!(report.dependencies[0].relocated);
        assert!(report.dependencies[0].cache_hit);
    }

    #[test]
    fn relocation_without_relocator_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("com.example.lib-1.0.jar"), JAR).unwrap();
        let mut manager = manager_for(temp.path(), &[]);
        manager.relocate(RelocationRule::new("com.example", "shaded"));

        match manager.load(&TestHost::new(), &GenericLoaderCache::new()) {
            ResolutionOutcome::Fatal(OrchestratorError::Relocation(
                RelocationFailure::Unavailable { coordinate },
            )) => assert_eq!(coordinate, "com.example:lib:1.0"),
            other => panic!("expected relocation failure, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_declarations_share_one_download() {
        let server = Server::run();
        serve_artifact(&server, "/repo", 1);
        let temp = tempfile::tempdir().unwrap();
        let mut manager = manager_for(temp.path(), &[server.url_str("/repo")])
            .download_workers(Some(4));
        manager.dependency("com.example:lib:1.0".parse().unwrap());
        let host = TestHost::new();

        let report = expect_ok(manager.load(&host, &GenericLoaderCache::new()));
        assert_eq!(report.dependencies.len(), 2);
        assert!(report
            .dependencies
            .iter()
            .all(|dep| dep.state == DependencyState::Staged));
        assert_eq!(host.target.paths().len(), 1);
    }
}
