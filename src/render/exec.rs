//! Subprocess execution for the rendering binaries
//!
//! Every invocation is a fresh child process. Its lifetime is bound to a
//! timeout, a cancellation future and the lifetime of the calling future:
//! the child is spawned with `kill_on_drop`, so dropping the request (client
//! disconnect) kills it as well.

use std::ffi::OsString;
use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::types::{RenderError, Result};

/// Read buffer size for captured output
const CHUNK_SIZE: usize = 8 * 1024;

/// How long to wait for the output pipes to drain after the child is gone
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Which output stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

// ============================================================
// Output fan-out
// ============================================================

/// Writer that forwards every chunk to the debug log
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    stream: OutputStream,
}

impl LogSink {
    pub fn new(stream: OutputStream) -> Self {
        Self { stream }
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        debug!(stream = %self.stream, output = %String::from_utf8_lossy(buf), "command output");
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer duplicating a byte stream into a primary and a side-channel writer.
///
/// Only the primary writer decides the result; failures of the side channel
/// are ignored.
#[derive(Debug)]
pub struct Tee<A, B> {
    primary: A,
    side: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(primary: A, side: B) -> Self {
        Self { primary, side }
    }

    /// Consume the tee, returning the primary writer
    pub fn into_primary(self) -> A {
        self.primary
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.primary.write(buf)?;
        let _ = self.side.write_all(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.side.flush();
        self.primary.flush()
    }
}

/// Copy a pipe into memory while logging it
async fn capture<R>(mut reader: R, stream: OutputStream) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut tee = Tee::new(Vec::new(), LogSink::new(stream));
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(stream = %stream, error = %e, "failed to read command output");
                break;
            }
        };
        if let Err(e) = tee.write_all(&chunk[..n]) {
            debug!(stream = %stream, error = %e, "failed to buffer command output");
            break;
        }
    }

    tee.into_primary()
}

fn spawn_capture<R>(reader: Option<R>, stream: OutputStream) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|reader| tokio::spawn(capture(reader, stream)))
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    let Some(mut handle) = handle else {
        return Vec::new();
    };
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!(error = %e, "output capture task failed");
            Vec::new()
        }
        Err(_) => {
            // a grandchild may hold the pipe open indefinitely
            handle.abort();
            warn!("output pipe still open after the command exited");
            Vec::new()
        }
    }
}

fn lossy_trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

// ============================================================
// Runner
// ============================================================

enum Outcome {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Runs rendering binaries with a bounded lifetime
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    /// Create a runner enforcing the given per-invocation timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Get the per-invocation timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program` to completion and return its stdout.
    ///
    /// The child is killed when the timeout elapses, when `cancel` resolves,
    /// or when the returned future is dropped.
    pub async fn run<C>(&self, program: &Path, args: &[OsString], cancel: C) -> Result<Vec<u8>>
    where
        C: Future<Output = ()>,
    {
        let name = program.display().to_string();
        debug!(command = %name, args = ?args, "running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                error!(command = %name, error = %source, "failed to start command");
                RenderError::Spawn {
                    program: name.clone(),
                    source,
                }
            })?;

        let stdout = spawn_capture(child.stdout.take(), OutputStream::Stdout);
        let stderr = spawn_capture(child.stderr.take(), OutputStream::Stderr);

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
            _ = cancel => Outcome::Cancelled,
        };

        if !matches!(outcome, Outcome::Exited(_)) {
            terminate(&mut child, &name).await;
        }

        let stdout = collect(stdout).await;
        let stderr = lossy_trimmed(&collect(stderr).await);

        match outcome {
            Outcome::Exited(Ok(status)) if status.success() => Ok(stdout),
            Outcome::Exited(Ok(status)) => {
                error!(command = %name, args = ?args, %status, stderr = %stderr, "failed to execute");
                Err(RenderError::ExecutionFailed {
                    program: name,
                    status,
                    stderr,
                })
            }
            Outcome::Exited(Err(source)) => {
                error!(command = %name, error = %source, "failed to wait for command");
                Err(RenderError::Wait {
                    program: name,
                    source,
                })
            }
            Outcome::TimedOut => {
                error!(command = %name, timeout = ?self.timeout, stderr = %stderr, "command timed out");
                Err(RenderError::TimedOut {
                    program: name,
                    timeout: self.timeout,
                    stderr,
                })
            }
            Outcome::Cancelled => {
                warn!(command = %name, "command cancelled");
                Err(RenderError::Cancelled { program: name })
            }
        }
    }
}

/// Kill and reap the child
async fn terminate(child: &mut Child, name: &str) {
    if let Err(e) = child.kill().await {
        warn!(command = %name, error = %e, "failed to kill command");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::render::types::ErrorKind;
    use std::path::PathBuf;
    use std::time::Instant;

    fn sh(script: &str) -> (PathBuf, Vec<OsString>) {
        (PathBuf::from("sh"), vec!["-c".into(), script.into()])
    }

    #[test]
    fn test_tee_duplicates_bytes() {
        let mut side = Vec::new();
        let mut tee = Tee::new(Vec::new(), &mut side);
        tee.write_all(b"Loading pages").unwrap();
        tee.write_all(b" (1/6)").unwrap();
        tee.flush().unwrap();
        let primary = tee.into_primary();
        assert_eq!(primary, b"Loading pages (1/6)");
        assert_eq!(side, b"Loading pages (1/6)");
    }

    #[test]
    fn test_log_sink_accepts_everything() {
        let mut sink = LogSink::new(OutputStream::Stderr);
        let chunk = b"\xff\xfe not utf8";
        assert_eq!(sink.write(chunk).unwrap(), chunk.len());
    }

    #[tokio::test]
    async fn test_run_returns_stdout() {
        let runner = CommandRunner::new(Duration::from_secs(10));
        let (program, args) = sh("printf 'wkhtmltopdf 0.12.6'; echo noise >&2");
        let out = runner
            .run(&program, &args, std::future::pending())
            .await
            .unwrap();
        assert_eq!(out, b"wkhtmltopdf 0.12.6");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_carries_stderr() {
        let runner = CommandRunner::new(Duration::from_secs(10));
        let (program, args) = sh("echo partial; echo 'Exit with code 1 due to network error' >&2; exit 1");
        let err = runner
            .run(&program, &args, std::future::pending())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert_eq!(err.stderr(), Some("Exit with code 1 due to network error"));
        assert!(err.to_string().contains("network error"));
    }

    #[tokio::test]
    async fn test_run_missing_binary() {
        let runner = CommandRunner::new(Duration::from_secs(10));
        let err = runner
            .run(
                Path::new("/nonexistent/wkhtmltopdf"),
                &[],
                std::future::pending(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }

    #[tokio::test]
    async fn test_run_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let runner = CommandRunner::new(Duration::from_millis(200));
        let (program, args) = sh(&format!(
            "echo $$ > {}; echo working >&2; exec sleep 30",
            pid_file.display()
        ));

        let started = Instant::now();
        let err = runner
            .run(&program, &args, std::future::pending())
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, RenderError::TimedOut { .. }));
        assert_eq!(err.stderr(), Some("working"));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let alive = std::process::Command::new("kill")
            .args(["-0", pid.trim()])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success(), "child {} still running", pid.trim());
    }

    #[tokio::test]
    async fn test_collect_aborts_stuck_capture() {
        let (reader, writer) = tokio::io::duplex(64);
        let handle = spawn_capture(Some(reader), OutputStream::Stderr).unwrap();
        let abort = handle.abort_handle();

        let started = Instant::now();
        let bytes = collect(Some(handle)).await;
        assert!(bytes.is_empty());
        assert!(started.elapsed() < DRAIN_TIMEOUT + Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(abort.is_finished());
        drop(writer);
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let runner = CommandRunner::new(Duration::from_secs(30));
        let (program, args) = sh("exec sleep 30");
        let started = Instant::now();
        let err = runner
            .run(
                &program,
                &args,
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(err, RenderError::Cancelled { .. }));
    }
}
