//! Git adapter for the patch and commit tools.
//!
//! Every git call goes through [`ProcessRunner`] so it gets the same deadline,
//! output capture, and failure typing as the test commands.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::core::commands::{git_apply_command, git_commit_command};
use crate::core::types::ExecutionResult;
use crate::error::ToolError;
use crate::io::process::ProcessRunner;

/// Wrapper for executing git commands in the project root.
#[derive(Debug, Clone)]
pub struct Git {
    runner: ProcessRunner,
    timeout: Duration,
}

impl Git {
    pub fn new(runner: ProcessRunner, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    pub fn workdir(&self) -> &Path {
        self.runner.root()
    }

    /// `git apply --check`: succeeds only if the patch applies cleanly.
    #[instrument(skip_all, fields(patch = %patch.display()))]
    pub fn apply_check(&self, patch: &Path) -> Result<ExecutionResult, ToolError> {
        let spec = git_apply_command(&patch.to_string_lossy(), true, self.timeout);
        let result = self.runner.run(&spec)?;
        debug!("patch applies cleanly");
        Ok(result)
    }

    /// `git apply`: mutate the working tree.
    #[instrument(skip_all, fields(patch = %patch.display()))]
    pub fn apply(&self, patch: &Path) -> Result<ExecutionResult, ToolError> {
        let spec = git_apply_command(&patch.to_string_lossy(), false, self.timeout);
        let result = self.runner.run(&spec)?;
        debug!("patch applied");
        Ok(result)
    }

    /// Commit whatever is staged, bypassing hooks.
    #[instrument(skip_all)]
    pub fn commit(&self, message: &str) -> Result<ExecutionResult, ToolError> {
        debug!("committing staged changes");
        self.runner.run(&git_commit_command(message, self.timeout))
    }
}
