//! Process execution - runs one check to completion and reduces it to
//! pass/fail.
//!
//! The check is spawned with the daemon's environment, no arguments, and
//! no shell. Both output streams are forwarded line-by-line to the log at
//! debug level; only the exit status decides the outcome.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::discovery::CheckDescriptor;

/// Seam between the scheduler and process execution.
///
/// The scheduler only needs "run this check, tell me if it passed", which
/// lets tests drive the scheduling machinery with a scripted executor.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    /// Run the check to completion and report success.
    async fn execute(&self, check: &CheckDescriptor) -> bool;
}

/// Executes checks as child processes.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CheckExecutor for ProcessRunner {
    async fn execute(&self, check: &CheckDescriptor) -> bool {
        run_check(check).await
    }
}

/// Spawn the check's executable and block until it exits.
///
/// Returns `false` for a spawn failure, a missing pipe handle, or any
/// non-zero exit. A failure while reading output is logged but does not
/// override the exit-status-derived outcome. There is no timeout: a hung
/// check blocks only its own schedule loop.
async fn run_check(check: &CheckDescriptor) -> bool {
    let mut child = match Command::new(&check.path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            error!(check = %check.name, error = %e, "Failed to start check");
            return false;
        }
    };

    let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
        (Some(out), Some(err)) => (out, err),
        _ => {
            error!(check = %check.name, "Failed to capture check output");
            let _ = child.kill().await;
            return false;
        }
    };

    // Drain both pipes before waiting so a chatty check cannot fill the
    // pipe buffer and deadlock against its own exit.
    tokio::join!(
        forward_lines(stdout, &check.name),
        forward_lines(stderr, &check.name),
    );

    match child.wait().await {
        Ok(status) if status.success() => true,
        Ok(status) => {
            error!(check = %check.name, %status, "Check exited with failure");
            false
        }
        Err(e) => {
            error!(check = %check.name, error = %e, "Failed to wait for check");
            false
        }
    }
}

/// Forward each line of a check's output to the log at debug level.
async fn forward_lines<R: AsyncRead + Unpin>(stream: R, check: &str) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(check = %check, "{}", line.trim()),
            Ok(None) => break,
            Err(e) => {
                warn!(check = %check, error = %e, "Failed to read check output");
                break;
            }
        }
    }
}
