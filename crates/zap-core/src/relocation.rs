//! Relocation seam. The bytecode rewrite itself is an external program.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::debug;
use zap_domain::{Coordinate, RelocationRules};

#[derive(Debug, thiserror::Error)]
pub enum RelocationFailure {
    #[error("{coordinate} needs relocation but no relocator is configured (pass --relocator)")]
    Unavailable { coordinate: String },
    #[error("failed to start relocator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("relocator `{program}` failed for {coordinate} ({status}): {stderr}")]
    Failed {
        program: String,
        coordinate: String,
        status: String,
        stderr: String,
    },
    #[error("relocator `{program}` produced no output for {coordinate}")]
    MissingOutput { program: String, coordinate: String },
    #[error("i/o error relocating to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Rewrites package prefixes inside an archive, writing a new archive at `output`.
pub trait Relocator: Send + Sync {
    /// # Errors
    /// Returns a [`RelocationFailure`] when the rewritten archive could not be produced.
    fn relocate(
        &self,
        coordinate: &Coordinate,
        input: &Path,
        output: &Path,
        rules: &RelocationRules,
    ) -> Result<(), RelocationFailure>;
}

/// Runs `program [args...] <input> <output> <from>=<to>...`.
#[derive(Debug, Clone)]
pub struct CommandRelocator {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandRelocator {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn display_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl Relocator for CommandRelocator {
    fn relocate(
        &self,
        coordinate: &Coordinate,
        input: &Path,
        output: &Path,
        rules: &RelocationRules,
    ) -> Result<(), RelocationFailure> {
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let io_failure = |path: &Path, source| RelocationFailure::Io {
            path: path.to_path_buf(),
            source,
        };
        let staging = NamedTempFile::new_in(parent).map_err(|source| io_failure(parent, source))?;

        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(input).arg(staging.path());
        for rule in rules.iter() {
            command.arg(rule.to_string());
        }
        debug!(%coordinate, program = %self.display_name(), "running relocator");
        let result = command.output().map_err(|source| RelocationFailure::Spawn {
            program: self.display_name(),
            source,
        })?;
        if !result.status.success() {
            return Err(RelocationFailure::Failed {
                program: self.display_name(),
                coordinate: coordinate.to_string(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        let produced = fs::metadata(staging.path())
            .map(|meta| meta.len())
            .unwrap_or(0);
        if produced == 0 {
            return Err(RelocationFailure::MissingOutput {
                program: self.display_name(),
                coordinate: coordinate.to_string(),
            });
        }
        staging
            .persist(output)
            .map_err(|err| io_failure(output, err.error))?;
        Ok(())
    }
}
