//! Declared configuration: the plain-text lists and properties block shipped alongside a host.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Coordinate, MavenRepository, RelocationRule, RelocationRules};

pub const REPOSITORIES_FILE: &str = "repositories.txt";
pub const DEPENDENCIES_FILE: &str = "dependencies.txt";
pub const RELOCATIONS_FILE: &str = "relocations.txt";
pub const PROPERTIES_FILE: &str = "zapper.properties";

const LIBS_FOLDER_KEY: &str = "libs-folder";
const RELOCATION_PREFIX_KEY: &str = "relocation-prefix";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{} is missing from {}; the declared configuration was not generated", PROPERTIES_FILE, .0.display())]
    MissingProperties(PathBuf),
    #[error("`{key}` is not set in {}", PROPERTIES_FILE)]
    MissingKey { key: &'static str },
    #[error("{file}:{line}: invalid dependency `{value}` (expected group:artifact:version[:classifier])")]
    InvalidDependency {
        file: &'static str,
        line: usize,
        value: String,
    },
    #[error("{file}:{line}: invalid repository `{value}`: {reason}")]
    InvalidRepository {
        file: &'static str,
        line: usize,
        value: String,
        reason: String,
    },
    #[error("{file}:{line}: invalid relocation `{value}` (expected from:to)")]
    InvalidRelocation {
        file: &'static str,
        line: usize,
        value: String,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct DeclaredConfig {
    pub libs_folder: String,
    pub relocation_prefix: Option<String>,
    pub repositories: Vec<MavenRepository>,
    pub dependencies: Vec<Coordinate>,
    pub relocations: RelocationRules,
}

impl DeclaredConfig {
    /// Loads every declared file from `dir`. Missing list files are empty lists; a missing
    /// properties file is an error.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] describing the first problem found.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let properties_path = dir.join(PROPERTIES_FILE);
        let Some(properties) = read_optional(&properties_path)? else {
            return Err(ConfigError::MissingProperties(dir.to_path_buf()));
        };
        let properties = parse_properties(&properties);
        let libs_folder = properties
            .get(LIBS_FOLDER_KEY)
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or(ConfigError::MissingKey {
                key: LIBS_FOLDER_KEY,
            })?;
        let relocation_prefix = properties
            .get(RELOCATION_PREFIX_KEY)
            .filter(|value| !value.is_empty())
            .cloned();

        let repositories = match read_optional(&dir.join(REPOSITORIES_FILE))? {
            Some(contents) => parse_repositories(&contents)?,
            None => Vec::new(),
        };
        let dependencies = match read_optional(&dir.join(DEPENDENCIES_FILE))? {
            Some(contents) => parse_dependencies(&contents)?,
            None => Vec::new(),
        };
        let relocations = match read_optional(&dir.join(RELOCATIONS_FILE))? {
            Some(contents) => parse_relocations(&contents)?,
            None => RelocationRules::default(),
        };

        Ok(Self {
            libs_folder,
            relocation_prefix,
            repositories,
            dependencies,
            relocations,
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn entries(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Parses one `group:artifact:version[:classifier]` per line.
///
/// # Errors
/// Returns [`ConfigError::InvalidDependency`] naming the offending line.
pub fn parse_dependencies(contents: &str) -> Result<Vec<Coordinate>, ConfigError> {
    entries(contents)
        .map(|(line, value)| {
            value
                .parse::<Coordinate>()
                .map_err(|_| ConfigError::InvalidDependency {
                    file: DEPENDENCIES_FILE,
                    line,
                    value: value.to_string(),
                })
        })
        .collect()
}

/// Parses one repository base URL per line.
///
/// # Errors
/// Returns [`ConfigError::InvalidRepository`] naming the offending line.
pub fn parse_repositories(contents: &str) -> Result<Vec<MavenRepository>, ConfigError> {
    entries(contents)
        .map(|(line, value)| {
            MavenRepository::new(value).map_err(|err| ConfigError::InvalidRepository {
                file: REPOSITORIES_FILE,
                line,
                value: value.to_string(),
                reason: err.reason,
            })
        })
        .collect()
}

/// Parses one `fromPrefix:toPrefix` per line.
///
/// # Errors
/// Returns [`ConfigError::InvalidRelocation`] naming the offending line.
pub fn parse_relocations(contents: &str) -> Result<RelocationRules, ConfigError> {
    entries(contents)
        .map(|(line, value)| match value.split_once(':') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                Ok(RelocationRule::new(from.trim(), to.trim()))
            }
            _ => Err(ConfigError::InvalidRelocation {
                file: RELOCATIONS_FILE,
                line,
                value: value.to_string(),
            }),
        })
        .collect()
}

/// Java-style properties: `key=value`, `key: value`, or `key value`; `#` and `!` start comments.
#[must_use]
pub fn parse_properties(contents: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let split_at = line
            .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
            .unwrap_or(line.len());
        let (key, rest) = line.split_at(split_at);
        let rest = rest.trim_start();
        let value = rest
            .strip_prefix('=')
            .or_else(|| rest.strip_prefix(':'))
            .unwrap_or(rest);
        properties.insert(key.to_string(), value.trim().to_string());
    }
    properties
}
