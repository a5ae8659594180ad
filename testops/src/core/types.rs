//! Shared value types for testops core logic.
//!
//! These types describe what to run and what came back. They carry no I/O and
//! are constructed fresh for every tool invocation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept per captured stream.
pub const MAX_OUTPUT_CHARS: usize = 200_000;

/// Summary classification of a project tree.
///
/// Routing never relies on this value alone; the tool surface composes the
/// individual probes instead. It exists for diagnostics and the `detect` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectKind {
    /// Python project (pytest / ruff / pyright or mypy).
    InterpretedScripting,
    /// Node project with a `package.json`.
    ScriptEcosystem,
    /// Node project that also compiles TypeScript.
    TypedScriptEcosystem,
    Unknown,
}

/// Node package manager governing a script-ecosystem project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    Pnpm,
    Yarn,
    Npm,
}

impl PackageManagerKind {
    pub fn program(self) -> &'static str {
        match self {
            Self::Pnpm => "pnpm",
            Self::Yarn => "yarn",
            Self::Npm => "npm",
        }
    }
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Ecosystem a command is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    Node(PackageManagerKind),
    Python,
}

/// An argument vector plus the deadline it must finish within.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Space-joined command line for diagnostics.
    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// Structured outcome of one child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Result of `apply_patch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOutcome {
    pub status: String,
    pub applied: bool,
}

impl PatchOutcome {
    pub fn ok(applied: bool) -> Self {
        Self {
            status: "ok".to_string(),
            applied,
        }
    }
}

/// Result of `git_commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub status: String,
    pub message: String,
}

impl CommitOutcome {
    pub fn committed(message: impl Into<String>) -> Self {
        Self {
            status: "committed".to_string(),
            message: message.into(),
        }
    }
}

/// Keep only the trailing `limit` characters of `text`.
///
/// Counts Unicode scalar values, so the cut never splits a character.
pub fn keep_tail(text: String, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text;
    }
    let skip = total - limit;
    match text.char_indices().nth(skip) {
        Some((offset, _)) => text[offset..].to_string(),
        None => String::new(),
    }
}
