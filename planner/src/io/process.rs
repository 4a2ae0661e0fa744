//! Child-process plumbing for command-backed collaborators.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Bounds applied to one child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// Bytes of stdout/stderr kept in memory; the rest is drained and dropped.
    pub output_limit_bytes: usize,
}

/// What the child produced before exiting or being killed.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped from stdout because of the output limit.
    pub stdout_dropped: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Spawn `argv`, feed `input` on stdin, and wait up to `limits.timeout`.
///
/// Stdout and stderr are drained on helper threads so a chatty child can
/// never block on a full pipe. On timeout the child is killed and
/// `timed_out` is set.
#[instrument(skip_all, fields(program = argv.first().map(String::as_str), timeout_secs = limits.timeout.as_secs()))]
pub fn run_with_input(argv: &[String], input: &[u8], limits: ProcessLimits) -> Result<ProcessOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty command"))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        stdin.write_all(input).context("write request to stdin")?;
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let limit = limits.output_limit_bytes;
    let stdout_reader = thread::spawn(move || drain_limited(stdout, limit));
    let stderr_reader = thread::spawn(move || drain_limited(stderr, limit));

    let (status, timed_out) = match child.wait_timeout(limits.timeout).context("wait for child")? {
        Some(status) => (status, false),
        None => {
            warn!("child exceeded timeout, killing");
            child.kill().context("kill child")?;
            (child.wait().context("reap child")?, true)
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("collect stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_reader).context("collect stderr")?;
    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "child output exceeded limit");
    }

    debug!(exit_code = ?status.code(), timed_out, "child finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        stdout_dropped,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read child output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let room = limit.saturating_sub(kept.len()).min(n);
        kept.extend_from_slice(&chunk[..room]);
        dropped += n - room;
    }
}
