use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;
use zap_core::{
    CodeLoadingTarget, CollectingTarget, CommandRelocator, Config, DependencyManager,
    GenericLoaderCache, LoaderError, LoaderHost, ManifestTarget, ResolutionOutcome,
};
use zap_domain::{DeclaredConfig, MavenRepository};
use zap_resolver::{HttpClient, HttpSettings, MavenResolver, RepositoryResolver, TransitiveResolver};

use crate::cli::{CommandCli, PathArgs, ResolveArgs, TreeArgs};
use crate::outcome::ExecutionOutcome;

const GENERIC_LOADER_KIND: &str = "path-report";

pub fn execute(command: &CommandCli, config: &Config) -> Result<ExecutionOutcome> {
    match command {
        CommandCli::Resolve(args) => resolve(args, config),
        CommandCli::Tree(args) => tree(args, config),
        CommandCli::Path(args) => path(args, config),
    }
}

pub fn command_name(command: &CommandCli) -> &'static str {
    match command {
        CommandCli::Resolve(_) => "resolve",
        CommandCli::Tree(_) => "tree",
        CommandCli::Path(_) => "path",
    }
}

/// Loader host for a command-line run: a manifest file stands in for the host's library
/// loader, and staged paths are otherwise reported back to the caller.
struct CliLoaderHost {
    manifest: Option<PathBuf>,
    reported: Arc<CollectingTarget>,
}

impl LoaderHost for CliLoaderHost {
    fn probe_specialized(&self) -> Result<Option<Arc<dyn CodeLoadingTarget>>, LoaderError> {
        let Some(manifest) = &self.manifest else {
            return Ok(None);
        };
        let target = ManifestTarget::open(manifest)?;
        Ok(Some(Arc::new(target)))
    }

    fn loader_kind(&self) -> String {
        GENERIC_LOADER_KIND.to_string()
    }

    fn generic_loader(&self) -> Result<Arc<dyn CodeLoadingTarget>, LoaderError> {
        Ok(self.reported.clone())
    }
}

fn resolve(args: &ResolveArgs, config: &Config) -> Result<ExecutionOutcome> {
    let declared = match DeclaredConfig::load(&args.config) {
        Ok(declared) => declared,
        Err(err) => {
            return Ok(ExecutionOutcome::failure(
                err.to_string(),
                json!({
                    "config": args.config,
                    "hint": "generate zapper.properties and the dependency lists into the config directory",
                }),
            ))
        }
    };
    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to determine the current directory")?,
    };
    let mut manager = match DependencyManager::from_declared(&declared, config, &data_dir) {
        Ok(manager) => manager,
        Err(err) => return Ok(ExecutionOutcome::failure(err.to_string(), json!({}))),
    };
    if let Some(program) = &args.relocator {
        manager = manager.relocator(Arc::new(CommandRelocator::new(program)));
    }

    let host = CliLoaderHost {
        manifest: args
            .loader_manifest
            .clone()
            .or_else(|| config.library_loader().cloned()),
        reported: Arc::new(CollectingTarget::new()),
    };
    debug!(manifest = ?host.manifest, "loader host");
    let outcome = manager.load(&host, &GenericLoaderCache::new());
    Ok(match outcome {
        ResolutionOutcome::Ok(report) => {
            let staged: Vec<&Path> = report.staged_paths().collect();
            let message = format!(
                "staged {} dependencies ({} downloaded, {} cached)",
                report.dependencies.len(),
                report.downloaded(),
                report.cache_hits()
            );
            ExecutionOutcome::success(
                message,
                json!({
                    "cache_root": report.cache_root,
                    "loader": report.loader,
                    "manifest": host.manifest,
                    "staged": staged,
                    "reported": host.reported.paths(),
                    "relocation_prefix": declared.relocation_prefix,
                    "dependencies": report.dependencies,
                }),
            )
        }
        ResolutionOutcome::Degraded { reason, report } => ExecutionOutcome::degraded(
            "no network available; dependencies were not staged",
            json!({
                "reason": reason,
                "cache_root": report.cache_root,
                "dependencies": report.dependencies,
                "hint": "connect to the network at least once so the libraries can be cached",
            }),
        ),
        ResolutionOutcome::Fatal(err) => ExecutionOutcome::failure(
            err.to_string(),
            json!({ "cache_root": manager.cache().root() }),
        ),
    })
}

fn tree(args: &TreeArgs, config: &Config) -> Result<ExecutionOutcome> {
    let http = metadata_client(config.network())?;
    let builder = TransitiveResolver::builder()
        .recursive(!args.no_recursive)
        .scopes(args.scopes.iter().copied())
        .max_descriptors(config.max_transitive());
    let builder = if args.no_central {
        builder.only_repositories(args.repositories.iter().cloned())
    } else {
        builder.repositories(args.repositories.iter().cloned())
    };
    let resolver = builder.build(http);
    let scopes: Vec<String> = resolver.scopes().iter().map(ToString::to_string).collect();
    let repositories: Vec<&str> = resolver
        .search_repositories()
        .iter()
        .map(MavenRepository::as_str)
        .collect();
    Ok(match resolver.resolve(&args.coordinate) {
        Ok(found) => {
            let dependencies: Vec<String> = found.iter().map(ToString::to_string).collect();
            ExecutionOutcome::success(
                format!(
                    "{} has {} transitive dependencies",
                    args.coordinate,
                    dependencies.len()
                ),
                json!({
                    "root": args.coordinate.to_string(),
                    "recursive": resolver.is_recursive(),
                    "scopes": scopes,
                    "repositories": repositories,
                    "dependencies": dependencies,
                }),
            )
        }
        Err(err) if err.is_offline() => ExecutionOutcome::degraded(
            err.to_string(),
            json!({ "root": args.coordinate.to_string() }),
        ),
        Err(err) => ExecutionOutcome::failure(
            err.to_string(),
            json!({ "root": args.coordinate.to_string(), "repositories": repositories }),
        ),
    })
}

fn path(args: &PathArgs, config: &Config) -> Result<ExecutionOutcome> {
    let repository = args
        .repository
        .clone()
        .unwrap_or_else(MavenRepository::maven_central);
    let resolver = MavenResolver::new(repository, metadata_client(config.network())?);
    let coordinate = &args.coordinate;
    let urls = resolver
        .resolve_artifact_url(coordinate)
        .and_then(|artifact| {
            Ok((
                artifact,
                resolver.resolve_descriptor_url(coordinate)?,
                resolver.resolve_checksum_url(coordinate)?,
            ))
        });
    Ok(match urls {
        Ok((artifact, descriptor, checksum)) => ExecutionOutcome::success(
            coordinate.to_string(),
            json!({
                "coordinate": coordinate.to_string(),
                "repository": resolver.repository().as_str(),
                "artifact": artifact.as_str(),
                "descriptor": descriptor.as_str(),
                "checksum": checksum.as_str(),
            }),
        ),
        Err(err) if err.is_offline() => ExecutionOutcome::degraded(
            err.to_string(),
            json!({ "coordinate": coordinate.to_string() }),
        ),
        Err(err) => ExecutionOutcome::failure(
            err.to_string(),
            json!({ "coordinate": coordinate.to_string() }),
        ),
    })
}

fn metadata_client(settings: &HttpSettings) -> Result<HttpClient> {
    HttpClient::metadata(settings).context("failed to initialise the HTTP client")
}
