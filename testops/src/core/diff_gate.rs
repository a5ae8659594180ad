//! Static path policy for unified diffs.
//!
//! Only the per-file header lines (`--- a/...` and `+++ b/...`) are inspected.
//! Hunk bodies are never scanned, so a forbidden token that appears in code
//! content does not trigger a rejection.

use crate::error::ToolError;

/// Path tokens a patch may never touch. Checked in this order.
pub const FORBIDDEN_TOKENS: [&str; 3] = ["infra/", "db/migrations/", "secrets"];

/// Reject the whole diff if any file header mentions a forbidden token.
///
/// Matching is a raw substring match anywhere in the header line, so
/// `app/infra/x` or `a/secrets.txt` are rejected as well.
pub fn check(diff: &str) -> Result<(), ToolError> {
    match first_forbidden_token(diff) {
        Some(token) => Err(ToolError::ForbiddenPath { token }),
        None => Ok(()),
    }
}

fn first_forbidden_token(diff: &str) -> Option<&'static str> {
    diff.lines().filter(|line| is_file_header(line)).find_map(|line| {
        FORBIDDEN_TOKENS
            .iter()
            .copied()
            .find(|token| line.contains(token))
    })
}

fn is_file_header(line: &str) -> bool {
    line.starts_with("+++") || line.starts_with("---")
}
