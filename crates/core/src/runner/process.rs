//! Async process runner with concurrent output readers and cancellation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::config::RunnerConfig;
use super::error::RunnerError;
use super::lines::LineSplitter;
use crate::artifact::remove_if_exists;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives every line read from a running process.
///
/// Called from both reader loops; no ordering is guaranteed between lines of
/// different streams.
pub trait LineSink: Send + Sync {
    fn on_line(&self, stream: OutputStream, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(OutputStream, &str) + Send + Sync,
{
    fn on_line(&self, stream: OutputStream, line: &str) {
        self(stream, line)
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LineSink for NullSink {
    fn on_line(&self, _stream: OutputStream, _line: &str) {}
}

/// Description of one external process invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    /// Binary to execute.
    pub program: PathBuf,
    /// Arguments, already serialized.
    pub args: Vec<String>,
    /// Files deleted after the process is killed on cancellation.
    pub cleanup_on_cancel: Vec<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cleanup_on_cancel: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Registers a partial output that must not survive a cancelled run.
    pub fn cleanup_on_cancel(mut self, path: impl Into<PathBuf>) -> Self {
        self.cleanup_on_cancel.push(path.into());
        self
    }

    /// Human-readable command line for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Result of a process that ran to completion (successfully or not).
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code, `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout and stderr, interleaved in arrival order.
    pub log: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Captured output shared by both reader loops, bounded to a tail.
#[derive(Debug)]
struct LogBuffer {
    text: Mutex<String>,
    max_bytes: usize,
}

impl LogBuffer {
    fn new(max_bytes: usize) -> Self {
        Self {
            text: Mutex::new(String::new()),
            max_bytes,
        }
    }

    fn append_line(&self, line: &str) {
        let mut text = self.text.lock().unwrap_or_else(|e| e.into_inner());
        text.push_str(line);
        text.push('\n');
        if text.len() > self.max_bytes {
            let mut cut = text.len() - self.max_bytes;
            while !text.is_char_boundary(cut) {
                cut += 1;
            }
            text.drain(..cut);
        }
    }

    fn into_string(self) -> String {
        self.text.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// One live external process together with its captured log.
struct ProcessHandle {
    child: Child,
    log: LogBuffer,
}

/// Spawns external processes and supervises them until exit or cancellation.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RunnerConfig::default())
    }

    /// Runs a process to completion, forwarding every output line to `sink`.
    ///
    /// Returns the exit code and captured log, or [`RunnerError::Cancelled`]
    /// if `cancel` fires first. The process runs in its own process group:
    /// on cancellation the whole group is killed and the leader reaped, both
    /// readers are dropped, and `spec.cleanup_on_cancel` files are deleted
    /// before returning. Descendants still holding the pipes after a normal
    /// exit are killed too.
    pub async fn run(
        &self,
        spec: &ProcessSpec,
        cancel: &CancelToken,
        sink: &dyn LineSink,
    ) -> Result<ProcessOutcome, RunnerError> {
        if cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }

        debug!("Running command: {}", spec.command_line());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so cancellation reaches every descendant.
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| RunnerError::Launch {
            program: spec.program.clone(),
            source,
        })?;
        let group = child.id();

        let mut handle = ProcessHandle {
            child,
            log: LogBuffer::new(self.config.max_log_bytes),
        };
        let stdout = handle.child.stdout.take();
        let stderr = handle.child.stderr.take();
        let buffer_size = self.config.read_buffer_bytes.max(1);

        let finished = {
            let log = &handle.log;
            let child = &mut handle.child;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = async {
                    let readers = async {
                        tokio::join!(
                            drain(stdout, OutputStream::Stdout, log, sink, buffer_size),
                            drain(stderr, OutputStream::Stderr, log, sink, buffer_size),
                        )
                    };
                    tokio::pin!(readers);

                    let mut readers_done = false;
                    let status = tokio::select! {
                        status = child.wait() => status,
                        _ = &mut readers => {
                            readers_done = true;
                            child.wait().await
                        }
                    };
                    if !readers_done {
                        // Leftover descendants still hold the pipes open.
                        if let Some(group) = group {
                            kill_group(group);
                        }
                        (&mut readers).await;
                    }
                    status
                } => Some(result),
            }
        };

        // Both readers are dropped at this point; nothing else touches the log.
        match finished {
            Some(Ok(status)) => {
                let exit_code = status.code();
                debug!(
                    "Process {} exited with {:?}",
                    spec.program.display(),
                    exit_code
                );
                Ok(ProcessOutcome {
                    exit_code,
                    log: handle.log.into_string(),
                })
            }
            Some(Err(source)) => Err(RunnerError::Io {
                program: spec.program.clone(),
                source,
            }),
            None => {
                info!("Cancelling {}", spec.program.display());
                // The unreaped leader keeps the group id valid until here.
                if let Some(group) = group {
                    kill_group(group);
                }
                if let Err(e) = handle.child.kill().await {
                    warn!("Failed to kill {}: {}", spec.program.display(), e);
                }
                for path in &spec.cleanup_on_cancel {
                    if let Err(e) = remove_if_exists(path).await {
                        warn!("Failed to remove partial output {}: {}", path.display(), e);
                    }
                }
                Err(RunnerError::Cancelled)
            }
        }
    }
}

/// Sends SIGKILL to every process in the group led by `group`.
#[cfg(unix)]
fn kill_group(group: u32) {
    let Ok(pgid) = libc::pid_t::try_from(group) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!("Failed to kill process group {}: {}", group, err);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_group: u32) {}

/// Reads one pipe until EOF, appending to the log and feeding the sink.
async fn drain<R>(
    reader: Option<R>,
    stream: OutputStream,
    log: &LogBuffer,
    sink: &dyn LineSink,
    buffer_size: usize,
) where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };

    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Stopped reading {:?}: {}", stream, e);
                break;
            }
        };
        for line in splitter.push(&buf[..n]) {
            log.append_line(&line);
            sink.on_line(stream, &line);
        }
    }
    if let Some(line) = splitter.finish() {
        log.append_line(&line);
        sink.on_line(stream, &line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_spaces() {
        let spec = ProcessSpec::new("ffmpeg")
            .args(["-y", "-i"])
            .arg("my video.mp4")
            .arg("out.gif");
        assert_eq!(spec.command_line(), "ffmpeg -y -i \"my video.mp4\" out.gif");
    }

    #[test]
    fn test_log_buffer_keeps_tail() {
        let log = LogBuffer::new(10);
        log.append_line("first line");
        log.append_line("second");
        let text = log.into_string();
        assert!(text.len() <= 10);
        assert!(text.ends_with("second\n"));
    }

    #[test]
    fn test_log_buffer_respects_char_boundaries() {
        let log = LogBuffer::new(5);
        log.append_line("ééééé");
        let text = log.into_string();
        assert!(text.len() <= 5);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_outcome_success() {
        let ok = ProcessOutcome {
            exit_code: Some(0),
            log: String::new(),
        };
        let failed = ProcessOutcome {
            exit_code: Some(1),
            log: String::new(),
        };
        let killed = ProcessOutcome {
            exit_code: None,
            log: String::new(),
        };
        assert!(ok.success());
        assert!(!failed.success());
        assert!(!killed.success());
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let runner = ProcessRunner::with_defaults();
        let spec = ProcessSpec::new("/nonexistent/vidium-test-binary");
        let err = runner
            .run(&spec, &CancelToken::new(), &NullSink)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_spawn() {
        let runner = ProcessRunner::with_defaults();
        let token = CancelToken::new();
        token.cancel();
        let spec = ProcessSpec::new("/nonexistent/vidium-test-binary");
        let err = runner.run(&spec, &token, &NullSink).await.unwrap_err();
        assert!(matches!(err, RunnerError::Cancelled));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::sync::Arc;
        use std::time::Duration;
        use tempfile::TempDir;

        fn sh(script: &str) -> ProcessSpec {
            ProcessSpec::new("sh").arg("-c").arg(script)
        }

        #[tokio::test]
        async fn test_captures_both_streams() {
            let runner = ProcessRunner::with_defaults();
            let lines = Arc::new(Mutex::new(Vec::new()));
            let sink = {
                let lines = Arc::clone(&lines);
                move |stream: OutputStream, line: &str| {
                    lines.lock().unwrap().push((stream, line.to_string()));
                }
            };

            let outcome = runner
                .run(
                    &sh("echo hello; echo oops 1>&2; printf 'a\\rb\\n'"),
                    &CancelToken::new(),
                    &sink,
                )
                .await
                .unwrap();

            assert!(outcome.success());
            assert!(outcome.log.contains("hello"));
            assert!(outcome.log.contains("oops"));

            let lines = lines.lock().unwrap();
            assert!(lines.contains(&(OutputStream::Stdout, "hello".to_string())));
            assert!(lines.contains(&(OutputStream::Stderr, "oops".to_string())));
            assert!(lines.contains(&(OutputStream::Stdout, "a".to_string())));
            assert!(lines.contains(&(OutputStream::Stdout, "b".to_string())));
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_returned() {
            let runner = ProcessRunner::with_defaults();
            let outcome = runner
                .run(&sh("echo failing 1>&2; exit 3"), &CancelToken::new(), &NullSink)
                .await
                .unwrap();
            assert_eq!(outcome.exit_code, Some(3));
            assert!(!outcome.success());
            assert!(outcome.log.contains("failing"));
        }

        #[tokio::test]
        async fn test_cancel_kills_process_and_removes_output() {
            let dir = TempDir::new().unwrap();
            let output = dir.path().join("partial.mp4");
            let script = format!("echo started > '{}'; sleep 30", output.display());
            let spec = sh(&script).cleanup_on_cancel(&output);

            let runner = ProcessRunner::with_defaults();
            let token = CancelToken::new();
            let canceller = {
                let token = token.clone();
                let output = output.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        if output.exists() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                    token.cancel();
                })
            };

            let result = tokio::time::timeout(
                Duration::from_secs(10),
                runner.run(&spec, &token, &NullSink),
            )
            .await
            .expect("cancellation should not hang");
            canceller.await.unwrap();

            assert!(matches!(result, Err(RunnerError::Cancelled)));
            assert!(!output.exists());
        }

        #[tokio::test]
        async fn test_cancel_kills_background_descendants() {
            let dir = TempDir::new().unwrap();
            let output = dir.path().join("late.mp4");
            let marker = dir.path().join("started");
            let script = format!(
                "(sleep 1; echo late > '{}') & touch '{}'; wait",
                output.display(),
                marker.display()
            );
            let spec = sh(&script).cleanup_on_cancel(&output);

            let runner = ProcessRunner::with_defaults();
            let token = CancelToken::new();
            let canceller = {
                let token = token.clone();
                let marker = marker.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        if marker.exists() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                    }
                    token.cancel();
                })
            };

            let result = tokio::time::timeout(
                Duration::from_secs(10),
                runner.run(&spec, &token, &NullSink),
            )
            .await
            .expect("cancellation should not hang");
            canceller.await.unwrap();
            assert!(matches!(result, Err(RunnerError::Cancelled)));

            // The backgrounded writer would have fired by now.
            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert!(!output.exists());
        }

        #[tokio::test]
        async fn test_exit_does_not_wait_for_descendants() {
            let runner = ProcessRunner::with_defaults();
            let outcome = tokio::time::timeout(
                Duration::from_secs(10),
                runner.run(
                    &sh("sleep 30 & echo done"),
                    &CancelToken::new(),
                    &NullSink,
                ),
            )
            .await
            .expect("a lingering descendant should not block completion")
            .unwrap();
            assert!(outcome.success());
            assert!(outcome.log.contains("done"));
        }
    }
}
