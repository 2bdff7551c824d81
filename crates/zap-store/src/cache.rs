//! On-disk cache layout: one flat directory, file names derived from coordinates.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use zap_domain::Coordinate;

const JAR_EXTENSION: &str = "jar";
const RELOCATED_SUFFIX: &str = "-relocated";

/// Where the cache root came from, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

/// Picks the cache root: an explicit override wins, otherwise `<data_dir>/<libs_folder>`.
///
/// # Errors
/// Fails only when a relative path must be absolutised and the working directory is unknown.
pub fn resolve_cache_root(
    override_path: Option<&Path>,
    data_dir: &Path,
    libs_folder: &str,
) -> io::Result<CacheLocation> {
    if let Some(path) = override_path {
        return Ok(CacheLocation {
            path: absolutize(path)?,
            source: "ZAP_CACHE_PATH",
        });
    }
    Ok(CacheLocation {
        path: absolutize(&data_dir.join(libs_folder))?,
        source: "libs-folder",
    })
}

fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<group>.<artifact>-<version>[-<classifier>].jar`
    #[must_use]
    pub fn artifact_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.root
            .join(format!("{}.{JAR_EXTENSION}", file_base(coordinate)))
    }

    /// `<group>.<artifact>-<version>[-<classifier>]-relocated.jar`
    #[must_use]
    pub fn relocated_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.root.join(format!(
            "{}{RELOCATED_SUFFIX}.{JAR_EXTENSION}",
            file_base(coordinate)
        ))
    }
}

// Classifier variants of one version would otherwise share a cache file.
fn file_base(coordinate: &Coordinate) -> String {
    let mut base = format!(
        "{}.{}-{}",
        coordinate.group_id(),
        coordinate.artifact_id(),
        coordinate.version()
    );
    if let Some(classifier) = coordinate.classifier() {
        base.push('-');
        base.push_str(classifier);
    }
    base
}
