//! Shared subprocess plumbing for both transports.
//!
//! Provides [`run`], the common spawn + capture + timeout logic. Each
//! transport builds a [`tokio::process::Command`] for its client binary
//! and delegates here.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::session::CommandOutput;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated to prevent memory exhaustion
/// from extremely verbose remote commands.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Spawn `cmd`, capture stdout/stderr, and enforce `timeout`.
///
/// Never returns an error: spawn failures and timeouts are folded into
/// the returned [`CommandOutput`] with exit code `-1` and the cause
/// appended to `stderr`. A signal-killed child also reports `-1`.
pub async fn run(cmd: &mut Command, timeout: Duration) -> CommandOutput {
    // kill_on_drop reaps the child if the timeout drops this future.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return CommandOutput {
                stdout: String::new(),
                stderr: format!("failed to spawn {program}: {e}"),
                exit_code: -1,
            }
        }
    };

    // stdout/stderr are drained from spawned tasks; `wait()` needs
    // `&mut child` back.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            CommandOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
            }
        }
        Ok(Err(e)) => CommandOutput {
            stdout: String::new(),
            stderr: format!("failed waiting on {program}: {e}"),
            exit_code: -1,
        },
        Err(_elapsed) => {
            // Timeout expired. Dropping `child` kills the process because
            // of `kill_on_drop(true)`; the readers then see EOF and hand
            // back whatever partial output was produced.
            drop(child);
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            let mut stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
            if !stderr.is_empty() && !stderr.ends_with('\n') {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "command timed out after {}s",
                timeout.as_secs()
            ));
            CommandOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr,
                exit_code: -1,
            }
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo hello; exit 3");
        let output = run(&mut cmd, Duration::from_secs(5)).await;
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn captures_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo oops >&2");
        let output = run(&mut cmd, Duration::from_secs(5)).await;
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn spawn_failure_reports_minus_one() {
        let mut cmd = Command::new("definitely-not-a-real-binary-7f3a");
        let output = run(&mut cmd, Duration::from_secs(5)).await;
        assert_eq!(output.exit_code, -1);
        assert!(output.stderr.contains("failed to spawn"));
    }

    #[tokio::test]
    async fn timeout_reports_minus_one_with_partial_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo started; sleep 30");
        let output = run(&mut cmd, Duration::from_millis(300)).await;
        assert_eq!(output.exit_code, -1);
        assert!(output.stderr.contains("timed out"));
        assert_eq!(output.stdout.trim(), "started");
    }
}
