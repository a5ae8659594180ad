//! Diagnostic tracing for the service.
//!
//! Everything goes to stderr. In `serve` mode stdout carries newline-delimited
//! JSON-RPC frames, and a single stray line there desynchronizes the client;
//! in one-shot mode stdout is the tool's JSON payload that scripts parse.
//! Nothing in this crate may print diagnostics to stdout.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_FILTER: &str = "warn";

/// Install the stderr subscriber.
///
/// ANSI colors are off: MCP hosts usually capture a server's stderr into a
/// log file rather than a terminal.
///
/// ```bash
/// RUST_LOG=testops=debug testops serve
/// ```
pub fn init() {
    let directives = std::env::var("RUST_LOG").ok();
    tracing_subscriber::registry()
        .with(filter_from(directives.as_deref()))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .compact(),
        )
        .init();
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
