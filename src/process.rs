// src/process.rs

use crate::backend::Invocation;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Stderr kept in memory per process; the rest is drained and dropped.
const CAPTURE_LIMIT: usize = 8 * 1024;

/// Result of collecting a tool's stderr after it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticCapture {
    Captured(String),
    TimedOut,
    Failed(String),
}

/// Result of signalling a tool and waiting for it to go away.
#[derive(Debug)]
pub enum Termination {
    Exited(ExitStatus),
    TimedOut,
    Failed(std::io::Error),
}

/// Spawn the tool with stderr piped into a background collector.
pub fn spawn(invocation: &Invocation) -> std::io::Result<(Child, JoinHandle<String>)> {
    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let collector = match child.stderr.take() {
        Some(stderr) => tokio::spawn(collect_lines(stderr)),
        None => tokio::spawn(async { String::new() }),
    };
    Ok((child, collector))
}

async fn collect_lines<R: AsyncRead + Unpin>(reader: R) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut buffer = String::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if buffer.len() < CAPTURE_LIMIT {
                    buffer.push_str(&line);
                    buffer.push('\n');
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("stderr read stopped: {}", e);
                break;
            }
        }
    }
    buffer
}

/// Wait at most `timeout` for the stderr collector to reach EOF.
pub async fn collect_diagnostics(collector: JoinHandle<String>, timeout: Duration) -> DiagnosticCapture {
    let abort = collector.abort_handle();
    match tokio::time::timeout(timeout, collector).await {
        Ok(Ok(text)) => DiagnosticCapture::Captured(text),
        Ok(Err(e)) => DiagnosticCapture::Failed(e.to_string()),
        Err(_) => {
            abort.abort();
            DiagnosticCapture::TimedOut
        }
    }
}

/// Signal the child and wait at most `timeout` for it to be reaped.
pub async fn terminate(mut child: Child, timeout: Duration) -> Termination {
    if let Err(e) = child.start_kill() {
        // Already reaped children report InvalidInput; anything else is a real failure.
        if e.kind() != std::io::ErrorKind::InvalidInput {
            return Termination::Failed(e);
        }
    }
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => Termination::Exited(status),
        Ok(Err(e)) => Termination::Failed(e),
        Err(_) => Termination::TimedOut,
    }
}

/// Leading `limit` characters of trimmed diagnostic text.
pub fn excerpt(text: &str, limit: usize) -> String {
    text.trim().chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_trims_and_bounds() {
        assert_eq!(excerpt("  \nboom\n", 100), "boom");
        assert_eq!(excerpt("abcdef", 3), "abc");
        assert_eq!(excerpt("", 3), "");
    }

    #[tokio::test]
    async fn collector_keeps_lines_up_to_limit() {
        let input: &[u8] = b"first\nsecond\n";
        assert_eq!(collect_lines(input).await, "first\nsecond\n");

        let big = "x".repeat(CAPTURE_LIMIT * 3) + "\n" + &"y".repeat(10) + "\n";
        let captured = collect_lines(big.as_bytes()).await;
        assert!(captured.starts_with('x'));
        assert!(!captured.contains('y'));
    }

    #[tokio::test]
    async fn collection_times_out_instead_of_blocking() {
        let collector = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            String::new()
        });
        let outcome = collect_diagnostics(collector, Duration::from_millis(20)).await;
        assert_eq!(outcome, DiagnosticCapture::TimedOut);
    }

    #[tokio::test]
    async fn panicking_collector_is_reported_as_failed() {
        let collector: JoinHandle<String> = tokio::spawn(async { panic!("reader blew up") });
        let outcome = collect_diagnostics(collector, Duration::from_secs(1)).await;
        assert!(matches!(outcome, DiagnosticCapture::Failed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_reaps_a_running_child() {
        let child = Command::new("sleep").arg("30").kill_on_drop(true).spawn().unwrap();
        match terminate(child, Duration::from_secs(5)).await {
            Termination::Exited(status) => assert!(!status.success()),
            other => panic!("unexpected termination outcome: {:?}", other),
        }
    }
}
