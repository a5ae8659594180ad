//! Stable exit codes for one-shot CLI commands.

use crate::error::ToolError;

/// Tool succeeded.
pub const OK: i32 = 0;
/// The command ran and failed, or an internal error occurred.
pub const FAILED: i32 = 1;
/// No supported ecosystem detected.
pub const UNSUPPORTED: i32 = 2;
/// The command exceeded its deadline.
pub const TIMEOUT: i32 = 3;
/// The diff touched a forbidden path.
pub const FORBIDDEN: i32 = 4;
/// Caller input failed a precondition.
pub const INVALID: i32 = 5;

pub fn for_error(err: &ToolError) -> i32 {
    match err {
        ToolError::UnsupportedProject { .. } => UNSUPPORTED,
        ToolError::ProcessTimeout { .. } => TIMEOUT,
        ToolError::ForbiddenPath { .. } => FORBIDDEN,
        ToolError::InvalidArgument(_) => INVALID,
        ToolError::ProcessFailed(_) | ToolError::Io { .. } => FAILED,
    }
}
