//! Test-operations tools for autonomous agents.
//!
//! This crate lets an agent run a project's tests, linter, and type-checker,
//! and validate, apply, and commit patches, without shelling out itself. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure logic (command construction, diff policy, value types).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem probes, child processes,
//!   git, config).
//!
//! [`tools`] composes both into the five callable operations, and [`mcp`]
//! exposes them over a stdio JSON-RPC transport.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod mcp;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
