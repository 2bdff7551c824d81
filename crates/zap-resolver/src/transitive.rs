//! Transitive dependency discovery through descriptor (POM) parsing.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexSet;
use tracing::{debug, info, warn};
use zap_domain::{Coordinate, Descriptor, MavenRepository, MavenScope, RepositorySet};

use crate::http::HttpClient;
use crate::repository::{MavenResolver, RepositoryResolver};
use crate::ResolutionError;

pub const DEFAULT_MAX_DESCRIPTORS: usize = 512;

/// Expands a root coordinate into the flat set of coordinates its descriptor declares,
/// filtered by scope and optionally followed recursively.
///
/// Every coordinate is expanded at most once, so dependency cycles terminate, and the total
/// number of descriptors fetched is capped.
#[derive(Debug, Clone)]
pub struct TransitiveResolver {
    recursive: bool,
    scopes: BTreeSet<MavenScope>,
    search_repositories: RepositorySet,
    max_descriptors: usize,
    http: HttpClient,
}

#[derive(Debug, Clone)]
pub struct TransitiveResolverBuilder {
    recursive: bool,
    scopes: BTreeSet<MavenScope>,
    search_repositories: RepositorySet,
    max_descriptors: usize,
}

impl Default for TransitiveResolverBuilder {
    fn default() -> Self {
        Self {
            recursive: true,
            scopes: BTreeSet::from([MavenScope::Compile]),
            search_repositories: RepositorySet::with_central(),
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
        }
    }
}

impl TransitiveResolverBuilder {
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Adds scopes to the accepted set, which starts as `{compile}`.
    #[must_use]
    pub fn scopes<I: IntoIterator<Item = MavenScope>>(mut self, scopes: I) -> Self {
        self.scopes.extend(scopes);
        self
    }

    /// Replaces the accepted scope set, dropping the default `compile`.
    #[must_use]
    pub fn only_scopes<I: IntoIterator<Item = MavenScope>>(mut self, scopes: I) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// Appends search repositories after Maven Central.
    #[must_use]
    pub fn repositories<I: IntoIterator<Item = MavenRepository>>(mut self, repositories: I) -> Self {
        self.search_repositories.extend(repositories);
        self
    }

    /// Replaces the search repositories, dropping the default Maven Central entry.
    #[must_use]
    pub fn only_repositories<I: IntoIterator<Item = MavenRepository>>(
        mut self,
        repositories: I,
    ) -> Self {
        self.search_repositories = RepositorySet::empty();
        self.search_repositories.extend(repositories);
        self
    }

    #[must_use]
    pub fn max_descriptors(mut self, limit: usize) -> Self {
        self.max_descriptors = limit.max(1);
        self
    }

    #[must_use]
    pub fn build(self, http: HttpClient) -> TransitiveResolver {
        TransitiveResolver {
            recursive: self.recursive,
            scopes: self.scopes,
            search_repositories: self.search_repositories,
            max_descriptors: self.max_descriptors,
            http,
        }
    }
}

struct Expansion<'a> {
    root: &'a Coordinate,
    visited: HashSet<Coordinate>,
    found: IndexSet<Coordinate>,
    fetched: usize,
}

impl TransitiveResolver {
    #[must_use]
    pub fn builder() -> TransitiveResolverBuilder {
        TransitiveResolverBuilder::default()
    }

    #[must_use]
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    #[must_use]
    pub fn scopes(&self) -> &BTreeSet<MavenScope> {
        &self.scopes
    }

    #[must_use]
    pub fn search_repositories(&self) -> &RepositorySet {
        &self.search_repositories
    }

    /// Returns the discovered coordinates in depth-first discovery order. The root itself is
    /// never part of the result.
    ///
    /// # Errors
    /// Fails when a descriptor cannot be found in any search repository, a fetch fails for any
    /// reason other than absence, or the expansion limit is exceeded.
    pub fn resolve(&self, root: &Coordinate) -> Result<IndexSet<Coordinate>, ResolutionError> {
        let mut expansion = Expansion {
            root,
            visited: HashSet::from([root.clone()]),
            found: IndexSet::new(),
            fetched: 0,
        };
        self.expand(root, &self.search_repositories, &mut expansion)?;
        info!(
            %root,
            dependencies = expansion.found.len(),
            descriptors = expansion.fetched,
            "transitive resolution finished"
        );
        Ok(expansion.found)
    }

    fn expand(
        &self,
        coordinate: &Coordinate,
        repositories: &RepositorySet,
        expansion: &mut Expansion<'_>,
    ) -> Result<(), ResolutionError> {
        if expansion.fetched >= self.max_descriptors {
            return Err(ResolutionError::ExpansionLimit {
                root: expansion.root.to_string(),
                limit: self.max_descriptors,
            });
        }
        expansion.fetched += 1;

        let descriptor = self.fetch_descriptor(coordinate, repositories)?;
        let direct: Vec<Coordinate> = descriptor
            .coordinates_for(coordinate, |scope| self.scopes.contains(&scope))
            .collect();
        debug!(%coordinate, direct = direct.len(), "descriptor dependencies");
        for dependency in &direct {
            if dependency != expansion.root {
                expansion.found.insert(dependency.clone());
            }
        }

        if !self.recursive {
            return Ok(());
        }

        let mut next = repositories.clone();
        for raw in &descriptor.repositories {
            match MavenRepository::new(raw) {
                Ok(repository) => {
                    next.insert(repository);
                }
                Err(err) => warn!(%coordinate, "ignoring descriptor repository: {err}"),
            }
        }
        for dependency in direct {
            if expansion.visited.insert(dependency.clone()) {
                self.expand(&dependency, &next, expansion)?;
            }
        }
        Ok(())
    }

    fn fetch_descriptor(
        &self,
        coordinate: &Coordinate,
        repositories: &RepositorySet,
    ) -> Result<Descriptor, ResolutionError> {
        for repository in repositories {
            let resolver = MavenResolver::new(repository.clone(), self.http.clone());
            let body = resolver
                .resolve_descriptor_url(coordinate)
                .and_then(|url| {
                    self.http
                        .get_text(&url)
                        .map_err(|source| ResolutionError::DescriptorFetch {
                            coordinate: coordinate.to_string(),
                            source,
                        })
                });
            match body {
                Ok(body) => {
                    debug!(%coordinate, %repository, "descriptor found");
                    return Ok(Descriptor::parse(coordinate, &body)?);
                }
                Err(err) if err.is_not_found() => {
                    debug!(%coordinate, %repository, "descriptor not in repository");
                }
                Err(err) => return Err(err),
            }
        }
        Err(ResolutionError::DescriptorNotFound {
            coordinate: coordinate.to_string(),
            repositories: repositories.to_string(),
        })
    }
}
