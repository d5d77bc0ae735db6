//! Child-process execution. `cmd` is always interpreted by a platform
//! shell (`sh -c` / `cmd /C`), per the data model: tasks write plain shell
//! command lines, not a pre-split argv, so redirection/pipes/globbing in a
//! task's `cmd` behave the way a user typing it at a terminal would expect.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::{sleep, Duration, Instant};

use crate::context::{is_cancelled, CancellationToken};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn child process: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && !self.cancelled && self.exit_code == Some(0)
    }
}

#[cfg(unix)]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    command
}

#[cfg(windows)]
fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd);
    command
}

const CANCELLATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns `cmd` under a platform shell in `cwd` with `env` merged onto the
/// inherited environment, streams each output line to `sink` as it arrives
/// (for the live-interleaved formatter), and also accumulates the full
/// stdout/stderr for cache capture and replay.
///
/// Honors `timeout_ms` (child is killed once elapsed) and `cancellation`
/// (polled at a fixed interval, matching the non-blocking poll loop the
/// prior generation of this executor used for the same purpose). Both paths
/// go straight to `Child::start_kill` — a hard kill, no intervening SIGTERM
/// grace period — matching the prior generation's own cancellation handling
/// (`system::executor`'s `child.kill()`), which never introduced a signal
/// crate for a two-stage terminate either. See DESIGN.md for the reasoning.
pub async fn execute(
    cmd: &str,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    timeout_ms: Option<u64>,
    cancellation: &CancellationToken,
    mut sink: impl FnMut(StreamKind, &[u8]) + Send,
) -> Result<ExecutionOutcome, ShellError> {
    let mut command = shell_command(cmd);
    command
        .current_dir(dunce::simplified(cwd))
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let mut stdout = BufReader::new(child.stdout.take().expect("stdout was piped")).lines();
    let mut stderr = BufReader::new(child.stderr.take().expect("stderr was piped")).lines();

    let mut outcome = ExecutionOutcome::default();
    let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

    loop {
        if let Some(dl) = deadline {
            if Instant::now() >= dl {
                let _ = child.start_kill();
                outcome.timed_out = true;
                break;
            }
        }
        if is_cancelled(cancellation) {
            let _ = child.start_kill();
            outcome.cancelled = true;
            break;
        }

        tokio::select! {
            line = stdout.next_line() => {
                if let Ok(Some(text)) = line {
                    sink(StreamKind::Stdout, text.as_bytes());
                    outcome.stdout.extend_from_slice(text.as_bytes());
                    outcome.stdout.push(b'\n');
                }
            }
            line = stderr.next_line() => {
                if let Ok(Some(text)) = line {
                    sink(StreamKind::Stderr, text.as_bytes());
                    outcome.stderr.extend_from_slice(text.as_bytes());
                    outcome.stderr.push(b'\n');
                }
            }
            status = child.wait() => {
                let status = status?;
                outcome.exit_code = status.code();
                return Ok(outcome);
            }
            () = sleep(CANCELLATION_POLL_INTERVAL) => {}
        }
    }

    // Drain whatever's left in the pipes, then reap the killed child.
    while let Ok(Some(text)) = stdout.next_line().await {
        outcome.stdout.extend_from_slice(text.as_bytes());
        outcome.stdout.push(b'\n');
    }
    while let Ok(Some(text)) = stderr.next_line().await {
        outcome.stderr.extend_from_slice(text.as_bytes());
        outcome.stderr.push(b'\n');
    }
    let status = child.wait().await?;
    outcome.exit_code = outcome.exit_code.or_else(|| status.code());
    Ok(outcome)
}

/// Replays a cache-hit entry's captured bytes to the current output
/// streams, exactly as step 3 of the task lifecycle requires.
pub async fn replay(stdout: &[u8], stderr: &[u8]) -> std::io::Result<()> {
    let mut out = tokio::io::stdout();
    out.write_all(stdout).await?;
    out.flush().await?;
    let mut err = tokio::io::stderr();
    err.write_all(stderr).await?;
    err.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn no_cancel() -> CancellationToken {
        Arc::new(AtomicBool::new(false))
    }

    #[tokio::test]
    async fn captures_stdout_of_successful_command() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(
            "echo hello",
            dir.path(),
            &BTreeMap::new(),
            None,
            &no_cancel(),
            |_, _| {},
        )
        .await
        .unwrap();
        assert!(outcome.succeeded());
        assert_eq!(String::from_utf8_lossy(&outcome.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute("exit 3", dir.path(), &BTreeMap::new(), None, &no_cancel(), |_, _| {})
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn timeout_kills_long_running_command() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = execute(
            "sleep 5",
            dir.path(),
            &BTreeMap::new(),
            Some(100),
            &no_cancel(),
            |_, _| {},
        )
        .await
        .unwrap();
        assert!(outcome.timed_out);
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn env_vars_are_passed_to_child() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("ZR_TEST_VAR".to_string(), "expected".to_string());
        let outcome = execute(
            "echo $ZR_TEST_VAR",
            dir.path(),
            &env,
            None,
            &no_cancel(),
            |_, _| {},
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8_lossy(&outcome.stdout).trim(), "expected");
    }
}
