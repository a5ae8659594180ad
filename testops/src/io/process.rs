//! Child process execution with a deadline and bounded, tail-preserving output.
//!
//! One call spawns exactly one child rooted at the project directory. Output is
//! drained concurrently by reader threads so a chatty child can never block on a
//! full pipe while we wait for it.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::{CommandSpec, ExecutionResult, keep_tail};
use crate::error::ToolError;

/// How long reader threads may keep draining after the child is gone.
///
/// Grandchildren that inherited the pipes can hold them open indefinitely; past
/// this point whatever was captured so far is returned.
const READER_GRACE: Duration = Duration::from_secs(5);

/// Runs commands inside a fixed project root.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    root: PathBuf,
    max_output_chars: usize,
}

impl ProcessRunner {
    pub fn new(root: impl Into<PathBuf>, max_output_chars: usize) -> Self {
        Self {
            root: root.into(),
            max_output_chars,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run `spec` to completion or until its timeout expires.
    ///
    /// A zero exit code yields the captured result. A non-zero exit, a signal,
    /// or a failure to start yields [`ToolError::ProcessFailed`] with the same
    /// result attached. Expiry kills the child and yields
    /// [`ToolError::ProcessTimeout`] with whatever output was captured.
    #[instrument(skip_all, fields(command = %spec.display(), timeout_secs = spec.timeout().as_secs()))]
    pub fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, ToolError> {
        let invocation = resolve_invocation(spec.args());
        let Some((program, args)) = invocation.split_first() else {
            return Err(ToolError::InvalidArgument("empty command".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning child process");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(ToolError::ProcessFailed(ExecutionResult {
                    command: spec.args().to_vec(),
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("failed to start {program}: {e}"),
                }));
            }
        };

        // Each char is at most 4 bytes; the extra slack absorbs a split leading char.
        let byte_limit = self.max_output_chars.saturating_mul(4).saturating_add(4);
        let stdout = StreamCapture::start(child.stdout.take(), byte_limit);
        let stderr = StreamCapture::start(child.stderr.take(), byte_limit);

        let exit_code = match wait_with_deadline(&mut child, spec.timeout())? {
            Some(code) => code,
            None => {
                let drain_by = Instant::now() + READER_GRACE;
                let stdout = stdout.finish(self.max_output_chars, drain_by);
                let stderr = stderr.finish(self.max_output_chars, drain_by);
                return Err(ToolError::ProcessTimeout {
                    command: spec.args().to_vec(),
                    timeout: spec.timeout(),
                    stdout,
                    stderr,
                });
            }
        };

        let drain_by = Instant::now() + READER_GRACE;
        let result = ExecutionResult {
            command: spec.args().to_vec(),
            exit_code,
            stdout: stdout.finish(self.max_output_chars, drain_by),
            stderr: stderr.finish(self.max_output_chars, drain_by),
        };

        debug!(exit_code, "command finished");
        if exit_code != 0 {
            warn!(exit_code, "command exited unsuccessfully");
            return Err(ToolError::ProcessFailed(result));
        }
        Ok(result)
    }
}

/// Wait for the child, killing it on expiry. `None` means the deadline fired.
///
/// Termination by signal is reported as exit code `-1`.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<Option<i32>, ToolError> {
    let waited = child
        .wait_timeout(timeout)
        .map_err(|e| ToolError::io("wait for command", e))?;
    match waited {
        Some(status) => Ok(Some(status.code().unwrap_or(-1))),
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            if let Err(e) = child.kill() {
                warn!(err = %e, "kill after timeout failed");
            }
            child
                .wait()
                .map_err(|e| ToolError::io("wait command after kill", e))?;
            Ok(None)
        }
    }
}

/// Trailing window over a byte stream.
#[derive(Debug, Default)]
struct TailBuffer {
    bytes: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl TailBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        // Compact lazily so the drain cost is amortized across chunks.
        if self.bytes.len() > self.limit.saturating_mul(2) {
            self.compact();
        }
    }

    fn compact(&mut self) {
        if self.bytes.len() > self.limit {
            let excess = self.bytes.len() - self.limit;
            self.bytes.drain(..excess);
            self.dropped += excess;
        }
    }

    fn into_text(mut self, max_chars: usize) -> String {
        self.compact();
        if self.dropped > 0 {
            debug!(dropped_bytes = self.dropped, "stream exceeded capture window");
        }
        keep_tail(String::from_utf8_lossy(&self.bytes).into_owned(), max_chars)
    }
}

/// Background reader for one pipe.
struct StreamCapture {
    buffer: Arc<Mutex<TailBuffer>>,
    done: Option<Receiver<()>>,
}

impl StreamCapture {
    fn start<R: Read + Send + 'static>(reader: Option<R>, byte_limit: usize) -> Self {
        let buffer = Arc::new(Mutex::new(TailBuffer::new(byte_limit)));
        let Some(reader) = reader else {
            return Self { buffer, done: None };
        };
        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&buffer);
        thread::spawn(move || {
            if let Err(e) = pump(reader, &shared) {
                warn!(err = %e, "output reader stopped early");
            }
            let _ = tx.send(());
        });
        Self {
            buffer,
            done: Some(rx),
        }
    }

    /// Wait until `drain_by` for the reader to hit EOF, then take what was
    /// captured. Both streams share one deadline.
    fn finish(self, max_chars: usize, drain_by: Instant) -> String {
        if let Some(done) = &self.done
            && done
                .recv_timeout(drain_by.saturating_duration_since(Instant::now()))
                .is_err()
        {
            warn!("pipe still open after child exit, returning partial output");
        }
        let tail = match self.buffer.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        tail.into_text(max_chars)
    }
}

fn pump<R: Read>(mut reader: R, buffer: &Mutex<TailBuffer>) -> std::io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        match buffer.lock() {
            Ok(mut guard) => guard.push(&chunk[..n]),
            Err(poisoned) => poisoned.into_inner().push(&chunk[..n]),
        }
    }
}

/// Turn command tokens into what is actually spawned.
///
/// On Windows, package-manager launchers are usually `.cmd` shims that
/// `CreateProcess` cannot start directly, so the program is looked up on `PATH`
/// and batch targets are routed through `cmd.exe /c`.
#[cfg(windows)]
fn resolve_invocation(args: &[String]) -> Vec<String> {
    let Some((program, rest)) = args.split_first() else {
        return Vec::new();
    };
    let resolved = which::which(program)
        .or_else(|_| which::which(format!("{program}.cmd")))
        .or_else(|_| which::which(format!("{program}.exe")));
    match resolved {
        Ok(path) => {
            let shell = which::which("cmd.exe")
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "cmd.exe".to_string());
            launcher_invocation(&path, rest, &shell)
        }
        Err(_) => args.to_vec(),
    }
}

#[cfg(not(windows))]
fn resolve_invocation(args: &[String]) -> Vec<String> {
    args.to_vec()
}

#[cfg_attr(not(windows), allow(dead_code))]
fn launcher_invocation(resolved: &Path, rest: &[String], shell: &str) -> Vec<String> {
    let target = resolved.to_string_lossy().into_owned();
    let is_batch = resolved
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("cmd") || ext.eq_ignore_ascii_case("bat"));
    let mut invocation = Vec::with_capacity(rest.len() + 3);
    if is_batch {
        invocation.push(shell.to_string());
        invocation.push("/c".to_string());
    }
    invocation.push(target);
    invocation.extend(rest.iter().cloned());
    invocation
}
