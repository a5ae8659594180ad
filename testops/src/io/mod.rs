//! Side-effecting helpers: filesystem probes, child processes, config, git.

pub mod classifier;
pub mod config;
pub mod git;
pub mod patch;
pub mod process;
