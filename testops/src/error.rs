//! Typed failures returned by every tool.
//!
//! Each variant carries enough context (command line, exit code, captured
//! output) for the caller to decide whether a retry makes sense.

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

use crate::core::types::ExecutionResult;

#[derive(Debug, Error)]
pub enum ToolError {
    /// No supported ecosystem was detected for the requested operation.
    #[error("unable to detect project type for {operation}")]
    UnsupportedProject { operation: &'static str },

    /// The child outlived its deadline and was killed.
    #[error("command timed out after {}s: {}", .timeout.as_secs(), .command.join(" "))]
    ProcessTimeout {
        command: Vec<String>,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    /// The child exited unsuccessfully (or could not be started).
    #[error("command failed with exit code {}: {}", .0.exit_code, .0.command.join(" "))]
    ProcessFailed(ExecutionResult),

    /// The diff names a path the safety policy refuses to touch.
    #[error("diff touches forbidden path: {token}")]
    ForbiddenPath { token: &'static str },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedProject { .. } => "UnsupportedProject",
            Self::ProcessTimeout { .. } => "ProcessTimeout",
            Self::ProcessFailed(_) => "ProcessFailed",
            Self::ForbiddenPath { .. } => "ForbiddenPath",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Io { .. } => "Io",
        }
    }

    /// Structured error payload handed back to callers.
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        let extra = match self {
            Self::UnsupportedProject { operation } => json!({ "operation": operation }),
            Self::ProcessTimeout {
                command,
                timeout,
                stdout,
                stderr,
            } => json!({
                "command": command,
                "timeout_sec": timeout.as_secs(),
                "stdout": stdout,
                "stderr": stderr,
            }),
            Self::ProcessFailed(result) => json!({
                "command": result.command,
                "exit_code": result.exit_code,
                "stdout": result.stdout,
                "stderr": result.stderr,
            }),
            Self::ForbiddenPath { token } => json!({ "token": token }),
            Self::InvalidArgument(_) | Self::Io { .. } => Value::Null,
        };
        if let (Value::Object(base), Value::Object(extra)) = (&mut payload, extra) {
            base.extend(extra);
        }
        payload
    }
}
