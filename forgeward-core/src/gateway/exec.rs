//! Isolated child-process execution
//!
//! Commands are spawned directly from an argument list, never through a
//! shell. A free-form command line is tokenized with shell-quoting rules
//! first and the token list is then executed as-is, so quoted input can
//! never be re-interpreted by a command interpreter.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Default wait for a spawned command, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Captured output of a completed command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
}

/// Terminal state of one execution request.
///
/// Exactly one variant holds per request; only `Completed` carries a
/// meaningful exit code.
#[derive(Debug)]
pub enum ExecOutcome {
    /// The command ran to completion within the timeout
    Completed(ExecOutput),
    /// The command was killed after the timeout expired
    TimedOut { timeout_secs: u64 },
    /// The first token did not name an executable on this host
    NotFound { executable: String },
    /// The command could not be run for another reason
    Failed { message: String },
}

/// Split a free-form command line into an argument list.
///
/// Quoted substrings stay single tokens (`nmap -p "80 443"` yields three
/// tokens). Unbalanced quoting is an invalid request, not a crash.
pub fn tokenize(command: &str) -> Result<Vec<String>> {
    match shlex::split(command) {
        Some(argv) if !argv.is_empty() => Ok(argv),
        Some(_) => Err(Error::InvalidRequest("empty command string".to_string())),
        None => Err(Error::InvalidRequest(format!(
            "unparsable command string: {command:?}"
        ))),
    }
}

/// Spawn `argv` directly and wait up to `timeout_secs` for it to exit.
///
/// On expiry the child and its process group are forcibly terminated
/// before this returns. The function holds no state across calls; each
/// invocation is independent and may run concurrently with others.
pub async fn execute(argv: &[String], timeout_secs: u64) -> Result<ExecOutcome> {
    let Some(executable) = argv.first() else {
        return Err(Error::InvalidRequest(
            "argument list must not be empty".to_string(),
        ));
    };

    let mut cmd = Command::new(executable);
    cmd.args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so a timeout can take descendants down too
    #[cfg(unix)]
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(executable, "executable not found");
            return Ok(ExecOutcome::NotFound {
                executable: executable.clone(),
            });
        }
        Err(err) => {
            warn!(executable, error = %err, "failed to spawn command");
            return Ok(ExecOutcome::Failed {
                message: err.to_string(),
            });
        }
    };

    let pid = child.id();
    let wait = child.wait_with_output();

    match tokio::time::timeout(Duration::from_secs(timeout_secs), wait).await {
        Ok(Ok(output)) => Ok(ExecOutcome::Completed(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            returncode: output.status.code().unwrap_or(-1),
        })),
        Ok(Err(err)) => Ok(ExecOutcome::Failed {
            message: err.to_string(),
        }),
        Err(_elapsed) => {
            // Dropping the wait future kills the child (kill_on_drop);
            // the group signal reaps anything it forked.
            kill_process_group(pid);
            warn!(executable, timeout_secs, "command timed out, killed");
            Ok(ExecOutcome::TimedOut { timeout_secs })
        }
    }
}

/// Convenience wrapper: tokenize a command line, then execute it.
pub async fn execute_line(command: &str, timeout_secs: u64) -> Result<ExecOutcome> {
    let argv = tokenize(command)?;
    execute(&argv, timeout_secs).await
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // Negative pid addresses the whole process group
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
