//! The externally callable operation set.
//!
//! Each tool is a thin composition: probe the project, build a command, run it
//! through the process runner. Routing is explicit over the classifier's
//! independent predicates.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

use crate::core::commands::{lint_command, test_command, typecheck_command};
use crate::core::types::{CommitOutcome, ExecutionResult, PatchOutcome, Toolchain};
use crate::error::ToolError;
use crate::io::classifier::ProjectProbe;
use crate::io::config::ServiceConfig;
use crate::io::git::Git;
use crate::io::patch::PatchApplicator;
use crate::io::process::ProcessRunner;

/// Tool entry points bound to one project root.
#[derive(Debug, Clone)]
pub struct TestOps {
    config: ServiceConfig,
    runner: ProcessRunner,
    git: Git,
    patches: PatchApplicator,
}

impl TestOps {
    pub fn new(config: ServiceConfig) -> Self {
        let runner = ProcessRunner::new(&config.project_root, config.limits.max_output_chars);
        let git = Git::new(runner.clone(), config.limits.git_timeout());
        let patches = PatchApplicator::new(git.clone());
        Self {
            config,
            runner,
            git,
            patches,
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.project_root
    }

    /// Fresh classifier snapshot of the project root.
    pub fn probe(&self) -> ProjectProbe {
        ProjectProbe::scan(self.root())
    }

    /// Run the test suite, optionally filtered by test name.
    #[instrument(skip_all, fields(pattern = pattern.unwrap_or_default()))]
    pub fn run_tests(
        &self,
        pattern: Option<&str>,
        timeout_sec: Option<u64>,
    ) -> Result<ExecutionResult, ToolError> {
        let timeout = timeout_from(timeout_sec, self.config.limits.tests_timeout_secs)?;
        let toolchain = test_toolchain(&self.probe()).ok_or(ToolError::UnsupportedProject {
            operation: "tests",
        })?;
        let spec = test_command(toolchain, pattern, timeout);
        info!(command = %spec.display(), "running tests");
        self.runner.run(&spec)
    }

    /// Run the linter over the whole tree.
    #[instrument(skip_all)]
    pub fn run_lint(&self, timeout_sec: Option<u64>) -> Result<ExecutionResult, ToolError> {
        let timeout = timeout_from(timeout_sec, self.config.limits.lint_timeout_secs)?;
        let toolchain = test_toolchain(&self.probe()).ok_or(ToolError::UnsupportedProject {
            operation: "lint",
        })?;
        let spec = lint_command(toolchain, timeout);
        info!(command = %spec.display(), "running lint");
        self.runner.run(&spec)
    }

    /// Run the type-checker.
    #[instrument(skip_all)]
    pub fn run_typecheck(&self, timeout_sec: Option<u64>) -> Result<ExecutionResult, ToolError> {
        let timeout = timeout_from(timeout_sec, self.config.limits.typecheck_timeout_secs)?;
        let toolchain = typecheck_toolchain(&self.probe()).ok_or(
            ToolError::UnsupportedProject {
                operation: "typecheck",
            },
        )?;
        let pyright = toolchain == Toolchain::Python && which::which("pyright").is_ok();
        let spec = typecheck_command(toolchain, pyright, timeout);
        info!(command = %spec.display(), "running typecheck");
        self.runner.run(&spec)
    }

    /// Validate a unified diff and, unless `dry_run`, apply it.
    pub fn apply_patch(&self, diff: &str, dry_run: bool) -> Result<PatchOutcome, ToolError> {
        self.patches.validate_and_apply(diff, dry_run)
    }

    /// Commit staged changes with `message`, skipping hooks.
    #[instrument(skip_all)]
    pub fn git_commit(&self, message: &str) -> Result<CommitOutcome, ToolError> {
        if message.trim().is_empty() {
            return Err(ToolError::InvalidArgument(
                "commit message is required".to_string(),
            ));
        }
        self.git.commit(message)?;
        info!("commit created");
        Ok(CommitOutcome::committed(message))
    }

    /// Execute a decoded tool call and serialize its success payload.
    pub fn dispatch(&self, call: &ToolCall) -> Result<Value, ToolError> {
        match call {
            ToolCall::RunTests(args) => {
                to_value(self.run_tests(args.pattern.as_deref(), args.timeout_sec)?)
            }
            ToolCall::RunLint(args) => to_value(self.run_lint(args.timeout_sec)?),
            ToolCall::RunTypecheck(args) => to_value(self.run_typecheck(args.timeout_sec)?),
            ToolCall::ApplyPatch(args) => to_value(self.apply_patch(&args.diff_text, args.dry_run)?),
            ToolCall::GitCommit(args) => to_value(self.git_commit(&args.message)?),
        }
    }
}

/// Test and lint routing: Node manifest first, then Python.
pub fn test_toolchain(probe: &ProjectProbe) -> Option<Toolchain> {
    if probe.script_ecosystem {
        Some(Toolchain::Node(probe.package_manager))
    } else if probe.interpreted_scripting {
        Some(Toolchain::Python)
    } else {
        None
    }
}

/// Typecheck routing: TypeScript only when a Node manifest is present too.
pub fn typecheck_toolchain(probe: &ProjectProbe) -> Option<Toolchain> {
    if probe.typed_script && probe.script_ecosystem {
        Some(Toolchain::Node(probe.package_manager))
    } else if probe.interpreted_scripting {
        Some(Toolchain::Python)
    } else {
        None
    }
}

fn timeout_from(timeout_sec: Option<u64>, default_secs: u64) -> Result<Duration, ToolError> {
    match timeout_sec.unwrap_or(default_secs) {
        0 => Err(ToolError::InvalidArgument(
            "timeout_sec must be > 0".to_string(),
        )),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::io("serialize tool result", e.into()))
}

/// Arguments for `run_tests`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunTestsArgs {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

/// Arguments for `run_lint` and `run_typecheck`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutArgs {
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

/// Arguments for `apply_patch`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyPatchArgs {
    #[serde(alias = "unified_diff")]
    pub diff_text: String,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

/// Arguments for `git_commit`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitCommitArgs {
    pub message: String,
}

/// A decoded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    RunTests(RunTestsArgs),
    RunLint(TimeoutArgs),
    RunTypecheck(TimeoutArgs),
    ApplyPatch(ApplyPatchArgs),
    GitCommit(GitCommitArgs),
}

/// Why a tool call could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidParams { tool: String, reason: String },
}

pub const TOOL_NAMES: [&str; 5] = [
    "run_tests",
    "run_lint",
    "run_typecheck",
    "apply_patch",
    "git_commit",
];

impl ToolCall {
    /// Decode `arguments` for tool `name`. A missing/null argument object is
    /// treated as `{}`.
    pub fn parse(name: &str, arguments: Option<Value>) -> Result<Self, CallError> {
        let arguments = match arguments {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(value) => value,
        };
        let invalid = |e: serde_json::Error| CallError::InvalidParams {
            tool: name.to_string(),
            reason: e.to_string(),
        };
        let call = match name {
            "run_tests" => Self::RunTests(serde_json::from_value(arguments).map_err(invalid)?),
            "run_lint" => Self::RunLint(serde_json::from_value(arguments).map_err(invalid)?),
            "run_typecheck" => {
                Self::RunTypecheck(serde_json::from_value(arguments).map_err(invalid)?)
            }
            "apply_patch" => Self::ApplyPatch(serde_json::from_value(arguments).map_err(invalid)?),
            "git_commit" => Self::GitCommit(serde_json::from_value(arguments).map_err(invalid)?),
            other => return Err(CallError::UnknownTool(other.to_string())),
        };
        Ok(call)
    }
}
