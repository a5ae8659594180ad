//! Gate, stage, validate, and optionally apply a unified diff.
//!
//! The diff is staged at a fixed dotfile in the project root. The scratch file
//! is owned by a guard that removes it on drop, so it is gone after every call
//! regardless of which step failed. Concurrent calls share that path and must
//! be serialized by the caller.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::core::diff_gate;
use crate::core::types::PatchOutcome;
use crate::error::ToolError;
use crate::io::git::Git;

/// Scratch file name, relative to the project root.
pub const SCRATCH_FILE_NAME: &str = ".testops.patch";

/// Validates and applies diffs against one project root.
#[derive(Debug, Clone)]
pub struct PatchApplicator {
    git: Git,
    scratch_path: PathBuf,
}

impl PatchApplicator {
    pub fn new(git: Git) -> Self {
        let scratch_path = git.workdir().join(SCRATCH_FILE_NAME);
        Self { git, scratch_path }
    }

    /// Gate, write scratch, `git apply --check`, `git apply` unless dry run, cleanup.
    ///
    /// With `dry_run` the working tree is never touched and `applied` is false.
    #[instrument(skip_all, fields(dry_run = dry_run, diff_bytes = diff.len()))]
    pub fn validate_and_apply(&self, diff: &str, dry_run: bool) -> Result<PatchOutcome, ToolError> {
        if let Err(err) = diff_gate::check(diff) {
            warn!(%err, "diff rejected by path policy");
            return Err(err);
        }

        let scratch = ScratchFile::create(&self.scratch_path, diff)?;
        self.git.apply_check(scratch.path())?;
        if dry_run {
            debug!("dry run, leaving working tree untouched");
            return Ok(PatchOutcome::ok(false));
        }
        self.git.apply(scratch.path())?;
        info!("patch applied to working tree");
        Ok(PatchOutcome::ok(true))
    }
}

/// A file that exists only as long as this guard does.
#[derive(Debug)]
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn create(path: &Path, contents: &str) -> Result<Self, ToolError> {
        // Take ownership before writing so a partial write is still cleaned up.
        let guard = Self {
            path: path.to_path_buf(),
        };
        fs::write(path, contents)
            .map_err(|e| ToolError::io(format!("write scratch patch {}", path.display()), e))?;
        Ok(guard)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(err = %e, path = %self.path.display(), "failed to remove scratch patch"),
        }
    }
}
