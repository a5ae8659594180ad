//! Test-operations tool server.
//!
//! `testops serve` speaks MCP over stdio for agent runtimes. The other
//! subcommands run a single tool and print its JSON payload, which is handy for
//! scripting and for checking what an agent would see.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use testops::error::ToolError;
use testops::exit_codes;
use testops::io::config::{ServiceConfig, TestOpsConfig, load_config, resolve_project_root};
use testops::tools::TestOps;
use testops::{logging, mcp};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "testops",
    version,
    about = "Test, lint, typecheck, and patch tools for coding agents"
)]
struct Cli {
    /// Project directory, relative to the working directory (overrides TESTOPS_PROJECT_ROOT).
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// TOML file with output and timeout limits.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tools over MCP (JSON-RPC on stdin/stdout).
    Serve,
    /// Print which ecosystems the project uses.
    Detect,
    /// Run the test suite.
    Test {
        /// Only run tests whose name matches.
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long)]
        timeout_sec: Option<u64>,
    },
    /// Run the linter.
    Lint {
        #[arg(long)]
        timeout_sec: Option<u64>,
    },
    /// Run the type-checker.
    Typecheck {
        #[arg(long)]
        timeout_sec: Option<u64>,
    },
    /// Validate a unified diff (read from a file, or `-` for stdin).
    ApplyPatch {
        diff: PathBuf,
        /// Apply the patch instead of only checking it.
        #[arg(long)]
        apply: bool,
    },
    /// Commit staged changes without running hooks.
    Commit { message: String },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = resolve_project_root(cli.project_root.as_deref())?;
    let limits = match &cli.config {
        Some(path) => load_config(path)?,
        None => TestOpsConfig::default(),
    };
    debug!(root = %root.display(), ?limits, "configuration resolved");
    let ops = TestOps::new(ServiceConfig::new(root, limits));

    match cli.command {
        Command::Serve => {
            let stdin = io::stdin();
            mcp::serve(ops, stdin.lock(), io::stdout()).context("serve mcp")?;
            Ok(exit_codes::OK)
        }
        Command::Detect => {
            let probe = ops.probe();
            let payload = json!({
                "project_root": ops.root().display().to_string(),
                "kind": probe.kind(),
                "probe": probe,
            });
            print_json(&payload)?;
            Ok(exit_codes::OK)
        }
        Command::Test {
            pattern,
            timeout_sec,
        } => report(ops.run_tests(pattern.as_deref(), timeout_sec)),
        Command::Lint { timeout_sec } => report(ops.run_lint(timeout_sec)),
        Command::Typecheck { timeout_sec } => report(ops.run_typecheck(timeout_sec)),
        Command::ApplyPatch { diff, apply } => {
            let diff_text = read_diff(&diff)?;
            report(ops.apply_patch(&diff_text, !apply))
        }
        Command::Commit { message } => report(ops.git_commit(&message)),
    }
}

/// Print the success or error payload and map it to an exit code.
fn report<T: serde::Serialize>(outcome: Result<T, ToolError>) -> Result<i32> {
    match outcome {
        Ok(value) => {
            let payload = serde_json::to_value(value).context("serialize result")?;
            print_json(&payload)?;
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("error: {err}");
            print_json(&err.to_payload())?;
            Ok(exit_codes::for_error(&err))
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{rendered}");
    Ok(())
}

fn read_diff(source: &Path) -> Result<String> {
    if source.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("read diff from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(source).with_context(|| format!("read diff {}", source.display()))
}
