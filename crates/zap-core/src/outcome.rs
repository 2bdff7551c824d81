use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use strum::Display;
use zap_domain::Coordinate;
use zap_store::Verification;

use crate::error::OrchestratorError;

/// Lifecycle of one declared dependency during a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DependencyState {
    Pending,
    CacheHit,
    Downloading,
    Downloaded,
    Relocating,
    Relocated,
    Staged,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    #[serde(serialize_with = "as_display")]
    pub coordinate: Coordinate,
    pub state: DependencyState,
    pub history: Vec<DependencyState>,
    /// Repository that delivered the artifact during this run.
    pub repository: Option<String>,
    pub path: Option<PathBuf>,
    pub cache_hit: bool,
    pub relocated: bool,
    pub verification: Option<Verification>,
}

impl DependencyReport {
    pub(crate) fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            state: DependencyState::Pending,
            history: vec![DependencyState::Pending],
            repository: None,
            path: None,
            cache_hit: false,
            relocated: false,
            verification: None,
        }
    }

    pub(crate) fn advance(&mut self, state: DependencyState) {
        tracing::debug!(coordinate = %self.coordinate, from = %self.state, to = %state, "state");
        self.state = state;
        self.history.push(state);
    }
}

fn as_display<S: Serializer>(coordinate: &Coordinate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(coordinate)
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub cache_root: PathBuf,
    /// Which loader accepted the staged paths; `None` when nothing was staged.
    pub loader: Option<String>,
    pub dependencies: Vec<DependencyReport>,
}

impl ResolutionReport {
    /// Staged paths in declaration order.
    pub fn staged_paths(&self) -> impl Iterator<Item = &Path> {
        self.dependencies
            .iter()
            .filter(|dep| dep.state == DependencyState::Staged)
            .filter_map(|dep| dep.path.as_deref())
    }

    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.dependencies
            .iter()
            .filter(|dep| dep.repository.is_some())
            .count()
    }

    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.dependencies.iter().filter(|dep| dep.cache_hit).count()
    }
}

#[derive(Debug)]
pub enum ResolutionOutcome {
    Ok(ResolutionReport),
    /// No network was reachable; nothing was staged and the host should continue without
    /// the libraries.
    Degraded {
        reason: String,
        report: ResolutionReport,
    },
    Fatal(OrchestratorError),
}

impl ResolutionOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    #[must_use]
    pub fn report(&self) -> Option<&ResolutionReport> {
        match self {
            Self::Ok(report) | Self::Degraded { report, .. } => Some(report),
            Self::Fatal(_) => None,
        }
    }
}
