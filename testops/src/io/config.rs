//! Service configuration: the project root plus tunable limits (TOML).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::MAX_OUTPUT_CHARS;

/// Environment variable that overrides the project root.
pub const PROJECT_ROOT_ENV: &str = "TESTOPS_PROJECT_ROOT";

/// Tunable limits (TOML).
///
/// Missing fields fall back to the defaults the tools advertise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestOpsConfig {
    /// Keep at most this many trailing characters per captured stream.
    pub max_output_chars: usize,

    /// Default deadline for `run_tests`.
    pub tests_timeout_secs: u64,

    /// Default deadline for `run_lint`.
    pub lint_timeout_secs: u64,

    /// Default deadline for `run_typecheck`.
    pub typecheck_timeout_secs: u64,

    /// Deadline for `git apply` and `git commit`.
    pub git_timeout_secs: u64,
}

impl Default for TestOpsConfig {
    fn default() -> Self {
        Self {
            max_output_chars: MAX_OUTPUT_CHARS,
            tests_timeout_secs: 300,
            lint_timeout_secs: 180,
            typecheck_timeout_secs: 300,
            git_timeout_secs: 30,
        }
    }
}

impl TestOpsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_output_chars == 0 {
            return Err(anyhow!("max_output_chars must be > 0"));
        }
        if self.tests_timeout_secs == 0 {
            return Err(anyhow!("tests_timeout_secs must be > 0"));
        }
        if self.lint_timeout_secs == 0 {
            return Err(anyhow!("lint_timeout_secs must be > 0"));
        }
        if self.typecheck_timeout_secs == 0 {
            return Err(anyhow!("typecheck_timeout_secs must be > 0"));
        }
        if self.git_timeout_secs == 0 {
            return Err(anyhow!("git_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TestOpsConfig::default()`.
pub fn load_config(path: &Path) -> Result<TestOpsConfig> {
    if !path.exists() {
        let cfg = TestOpsConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TestOpsConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Everything a tool invocation needs, resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub project_root: PathBuf,
    pub limits: TestOpsConfig,
}

impl ServiceConfig {
    pub fn new(project_root: impl Into<PathBuf>, limits: TestOpsConfig) -> Self {
        Self {
            project_root: project_root.into(),
            limits,
        }
    }
}

/// Resolve the project root from the `--project-root` flag, then the
/// environment, then the service's install directory.
///
/// A relative flag is taken relative to the caller's working directory; a
/// relative `TESTOPS_PROJECT_ROOT` is taken relative to the install directory.
pub fn resolve_project_root(cli_override: Option<&Path>) -> Result<PathBuf> {
    let cwd = env::current_dir().context("read current directory")?;
    let env_override = env::var_os(PROJECT_ROOT_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    choose_root(cli_override, env_override.as_deref(), &cwd, &install_dir()?)
}

fn choose_root(
    cli_override: Option<&Path>,
    env_override: Option<&Path>,
    cwd: &Path,
    install_dir: &Path,
) -> Result<PathBuf> {
    match cli_override {
        Some(flag) => resolve_root_from(Some(flag), cwd),
        None => resolve_root_from(env_override, install_dir),
    }
}

fn resolve_root_from(candidate: Option<&Path>, default_root: &Path) -> Result<PathBuf> {
    let Some(candidate) = candidate else {
        debug!(root = %default_root.display(), "no root override, using install dir");
        return Ok(default_root.to_path_buf());
    };
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        default_root.join(candidate)
    };
    let root = joined
        .canonicalize()
        .with_context(|| format!("resolve project root {}", joined.display()))?;
    if !root.is_dir() {
        return Err(anyhow!("project root {} is not a directory", root.display()));
    }
    debug!(root = %root.display(), "resolved project root override");
    Ok(root)
}

/// Directory containing the running executable.
fn install_dir() -> Result<PathBuf> {
    let exe = env::current_exe().context("locate current executable")?;
    let dir = exe
        .parent()
        .with_context(|| format!("executable has no parent {}", exe.display()))?;
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TestOpsConfig::default());
        assert_eq!(cfg.max_output_chars, 200_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("testops.toml");
        fs::write(&path, "lint_timeout_secs = 60\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.lint_timeout_secs, 60);
        assert_eq!(cfg.tests_timeout_secs, 300);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("testops.toml");
        fs::write(&path, "git_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("git_timeout_secs"));
    }

    #[test]
    fn root_defaults_to_install_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = resolve_root_from(None, temp.path()).expect("resolve");
        assert_eq!(root, temp.path());
    }

    #[test]
    fn relative_env_override_is_joined_to_install_dir() {
        let install = tempfile::tempdir().expect("tempdir");
        let cwd = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(install.path().join("work/project")).expect("mkdir");
        let root = choose_root(
            None,
            Some(Path::new("work/project")),
            cwd.path(),
            install.path(),
        )
        .expect("resolve");
        let expected = install
            .path()
            .join("work/project")
            .canonicalize()
            .expect("canon");
        assert_eq!(root, expected);
    }

    #[test]
    fn relative_flag_is_joined_to_working_dir() {
        let install = tempfile::tempdir().expect("tempdir");
        let cwd = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(cwd.path().join("project")).expect("mkdir");

        let root = choose_root(Some(Path::new(".")), None, cwd.path(), install.path())
            .expect("resolve dot");
        assert_eq!(root, cwd.path().canonicalize().expect("canon"));

        let root = choose_root(
            Some(Path::new("project")),
            Some(Path::new("elsewhere")),
            cwd.path(),
            install.path(),
        )
        .expect("resolve relative");
        assert_eq!(root, cwd.path().join("project").canonicalize().expect("canon"));
    }

    #[test]
    fn relative_flag_missing_under_working_dir_is_an_error() {
        let install = tempfile::tempdir().expect("tempdir");
        let cwd = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(install.path().join("project")).expect("mkdir");
        let err = choose_root(Some(Path::new("project")), None, cwd.path(), install.path())
            .unwrap_err();
        assert!(err.to_string().contains("resolve project root"));
    }

    #[test]
    fn missing_override_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = resolve_root_from(Some(&temp.path().join("nope")), temp.path()).unwrap_err();
        assert!(err.to_string().contains("resolve project root"));
    }
}
