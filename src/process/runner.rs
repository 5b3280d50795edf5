//! Child process execution with streamed, classified output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::Result;
use crate::process::classify::{LineClassifier, Severity};
use crate::process::heartbeat::Heartbeat;
use crate::report::RunReport;

/// What to do with each complete line arriving on one output stream.
#[derive(Debug, Clone)]
pub enum StreamSink {
    /// Capture only; emit nothing.
    Ignore,
    /// Every line is informational.
    Log,
    /// Every line is an error.
    Error,
    /// Per-line severity decided by a pattern set.
    Classify(LineClassifier),
}

/// Bounded retry with a fixed backoff between attempts.
///
/// Callers retrying a mutating step must reset its outputs before invoking
/// the runner, so a retried attempt never appends to a partial result.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub cwd: Option<PathBuf>,
    pub stdout: StreamSink,
    pub stderr: StreamSink,
    pub retry: Option<RetryPolicy>,
    pub heartbeat: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            stdout: StreamSink::Log,
            stderr: StreamSink::Error,
            retry: None,
            heartbeat: false,
        }
    }
}

/// Captured result of one external command.
///
/// A non-zero exit is reported through `exit_failed`, never as an `Err`:
/// the caller decides severity, and most stages record the failure and keep
/// going. `Err` is reserved for the spawn itself going wrong.
#[derive(Debug)]
pub struct ProcessOutput {
    pub exit_failed: bool,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run(
    report: &RunReport,
    command: &str,
    args: &[&str],
    options: &ExecOptions,
) -> Result<ProcessOutput> {
    let Some(policy) = options.retry else {
        return run_once(report, command, args, options).await;
    };

    let attempts = policy.attempts.max(1);
    let mut last = run_once(report, command, args, options).await?;
    for attempt in 2..=attempts {
        if !last.exit_failed {
            break;
        }
        report.log_line(&format!(
            "Retrying '{command}' (attempt {attempt} of {attempts})"
        ));
        tokio::time::sleep(policy.backoff).await;
        last = run_once(report, command, args, options).await?;
    }
    Ok(last)
}

async fn run_once(
    report: &RunReport,
    command: &str,
    args: &[&str],
    options: &ExecOptions,
) -> Result<ProcessOutput> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    let _heartbeat = options
        .heartbeat
        .then(|| Heartbeat::start(report.clone()));

    let mut child = cmd.spawn()?;
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let (stdout, stderr, status) = tokio::try_join!(
        drain_lines(stdout_pipe, options.stdout.clone(), report.clone()),
        drain_lines(stderr_pipe, options.stderr.clone(), report.clone()),
        async { child.wait().await },
    )?;

    Ok(ProcessOutput {
        exit_failed: !status.success(),
        stdout,
        stderr,
    })
}

/// Run a command and return its trimmed stdout, or an empty string on any
/// failure. Used for optional metadata queries where absence is acceptable.
pub async fn run_simple(
    report: &RunReport,
    command: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> String {
    let options = ExecOptions {
        cwd: cwd.map(Path::to_path_buf),
        stdout: StreamSink::Ignore,
        stderr: StreamSink::Error,
        ..ExecOptions::default()
    };
    match run(report, command, args, &options).await {
        Ok(output) if !output.exit_failed => output.stdout.trim().to_string(),
        _ => String::new(),
    }
}

async fn drain_lines<R>(
    pipe: Option<R>,
    sink: StreamSink,
    report: RunReport,
) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(String::new());
    };

    let mut lines = BufReader::new(pipe).lines();
    let mut captured = String::new();
    while let Some(line) = lines.next_line().await? {
        match &sink {
            StreamSink::Ignore => {}
            StreamSink::Log => report.log_line(&line),
            StreamSink::Error => report.error_line(&line),
            StreamSink::Classify(classifier) => match classifier.classify(&line) {
                Severity::Log => report.log_line(&line),
                Severity::Error => report.error_line(&line),
            },
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_streamed_stdout() {
        let report = RunReport::new();
        let options = ExecOptions {
            stdout: StreamSink::Ignore,
            ..ExecOptions::default()
        };
        let output = run(&report, "sh", &["-c", "printf 'one\\ntwo\\n'"], &options)
            .await
            .unwrap();
        assert!(!output.exit_failed);
        assert_eq!(output.stdout, "one\ntwo\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_is_surfaced_not_raised() {
        let report = RunReport::new();
        let options = ExecOptions {
            stderr: StreamSink::Ignore,
            ..ExecOptions::default()
        };
        let output = run(&report, "sh", &["-c", "exit 3"], &options).await.unwrap();
        assert!(output.exit_failed);
        assert_eq!(report.error_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn retry_surfaces_the_last_failure() {
        let report = RunReport::new();
        let options = ExecOptions {
            stderr: StreamSink::Ignore,
            retry: Some(RetryPolicy {
                attempts: 3,
                backoff: Duration::from_millis(1),
            }),
            ..ExecOptions::default()
        };
        let output = run(&report, "sh", &["-c", "exit 1"], &options).await.unwrap();
        assert!(output.exit_failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn classified_stdout_lines_reach_the_ledger() {
        let report = RunReport::new();
        let options = ExecOptions {
            stdout: StreamSink::Classify(LineClassifier::build_output()),
            ..ExecOptions::default()
        };
        let output = run(
            &report,
            "sh",
            &["-c", "printf 'building fine\\nFAILED: link step\\n'"],
            &options,
        )
        .await
        .unwrap();
        assert!(!output.exit_failed);
        assert_eq!(report.error_count(), 1);
        assert!(output.stdout.contains("FAILED"));
    }

    #[tokio::test]
    async fn spawning_a_missing_binary_is_an_error() {
        let report = RunReport::new();
        let result = run(
            &report,
            "definitely-not-a-real-tool-9000",
            &[],
            &ExecOptions::default(),
        )
        .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_simple_degrades_to_empty_on_failure() {
        let report = RunReport::new();
        assert_eq!(run_simple(&report, "sh", &["-c", "echo  hi "], None).await, "hi");
        assert_eq!(run_simple(&report, "sh", &["-c", "exit 1"], None).await, "");
    }
}
