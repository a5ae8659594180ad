//! Test-only helpers for building throwaway projects.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::io::config::{ServiceConfig, TestOpsConfig};
use crate::tools::TestOps;

/// A temporary project directory, removed on drop.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp project")?;
        Ok(Self { dir })
    }

    /// Temp project initialized as a git repo with one commit of `files`.
    pub fn git_with_files(files: &[(&str, &str)]) -> Result<Self> {
        let project = Self::new()?;
        for (rel, contents) in files {
            project.write(rel, contents)?;
        }
        project.git(&["init", "-q"])?;
        project.git(&["config", "user.name", "TestOps Tests"])?;
        project.git(&["config", "user.email", "testops@local.invalid"])?;
        project.git(&["config", "commit.gpgsign", "false"])?;
        project.git(&["add", "-A"])?;
        project.git(&["commit", "-q", "-m", "chore: seed project"])?;
        Ok(project)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Tool surface rooted at this project with default limits.
    pub fn ops(&self) -> TestOps {
        self.ops_with(TestOpsConfig::default())
    }

    pub fn ops_with(&self, limits: TestOpsConfig) -> TestOps {
        TestOps::new(ServiceConfig::new(self.path(), limits))
    }

    /// Run git in the project and return stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("run git {:?}", args))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {:?} failed: {}", args, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Unified diff replacing the single line `old` with `new` in `path`.
pub fn single_line_diff(path: &str, old: &str, new: &str) -> String {
    format!("diff --git a/{path} b/{path}\n--- a/{path}\n+++ b/{path}\n@@ -1 +1 @@\n-{old}\n+{new}\n")
}
