use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

use crate::MavenRepository;

/// Insertion-ordered, duplicate-free repositories; iteration order is fallback priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySet {
    entries: IndexSet<MavenRepository>,
}

impl RepositorySet {
    /// A set seeded with Maven Central.
    #[must_use]
    pub fn with_central() -> Self {
        let mut entries = IndexSet::new();
        entries.insert(MavenRepository::maven_central());
        Self { entries }
    }

    /// A set with no seed entry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: IndexSet::new(),
        }
    }

    /// Returns `true` when the repository was not present yet.
    pub fn insert(&mut self, repository: MavenRepository) -> bool {
        self.entries.insert(repository)
    }

    pub fn extend<I: IntoIterator<Item = MavenRepository>>(&mut self, repositories: I) {
        self.entries.extend(repositories);
    }

    #[must_use]
    pub fn contains(&self, repository: &MavenRepository) -> bool {
        self.entries.contains(repository)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MavenRepository> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RepositorySet {
    fn default() -> Self {
        Self::with_central()
    }
}

impl<'a> IntoIterator for &'a RepositorySet {
    type Item = &'a MavenRepository;
    type IntoIter = indexmap::set::Iter<'a, MavenRepository>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for RepositorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .entries
            .iter()
            .map(MavenRepository::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{joined}]")
    }
}

/// A `from -> to` package prefix rewrite handed to the relocation transform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelocationRule {
    pub from: String,
    pub to: String,
}

impl RelocationRule {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for RelocationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.from, self.to)
    }
}

/// Ordered relocation rules; repeated rules are kept once, at their first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationRules {
    entries: IndexSet<RelocationRule>,
}

impl RelocationRules {
    pub fn push(&mut self, rule: RelocationRule) -> bool {
        self.entries.insert(rule)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelocationRule> {
        self.entries.iter()
    }
}

impl FromIterator<RelocationRule> for RelocationRules {
    fn from_iter<T: IntoIterator<Item = RelocationRule>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
