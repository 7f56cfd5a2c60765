use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use log::debug;
use log::trace;
use log::warn;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio::time::Instant;

use crate::constants::CMD_TIMEOUT;
use crate::error::ctx;
use crate::error::JobError;

/// How long we keep reading a killed process' pipes. Grandchildren may hold
/// them open long after the process itself is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// A command to run, with everything needed to run it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    /// The binary to start.
    pub bin_path: PathBuf,

    /// The arguments, in order.
    pub args: Vec<String>,

    /// The working directory, the current one if unset.
    pub exec_dir: Option<PathBuf>,

    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, String)>,

    /// The deadline after which the process is killed.
    pub timeout: Duration,
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Everything written to standard output.
    pub stdout: String,

    /// Everything written to standard error.
    pub stderr: String,

    /// The exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl Cmd {
    /// A command running `bin_path` with no arguments and the default deadline.
    pub fn new(bin_path: impl Into<PathBuf>) -> Self {
        Self {
            bin_path: bin_path.into(),
            args: Vec::new(),
            exec_dir: None,
            env: Vec::new(),
            timeout: CMD_TIMEOUT,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().to_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|a| a.as_ref().to_string_lossy().to_string()),
        );
        self
    }

    /// Run inside `dir`.
    pub fn current_dir(mut self, dir: Option<&Path>) -> Self {
        self.exec_dir = dir.map(Path::to_path_buf);
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Replace the deadline.
    pub fn timeout(mut self, deadline: Duration) -> Self {
        self.timeout = deadline;
        self
    }

    /// The command as a user would type it.
    pub fn command_line(&self) -> String {
        let mut line = self.bin_path.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run the command to completion and return its output, whatever the exit
    /// code.
    ///
    /// Fails if the process cannot be started, or with [JobError::Timeout] if
    /// it outlives its deadline.
    pub async fn output(&self) -> Result<ExecOutput> {
        let line = self.command_line();
        debug!("Running {line}");

        let mut command = Command::new(&self.bin_path);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.exec_dir {
            command.current_dir(dir);
        }

        for (key, value) in &self.env {
            command.env(key, value);
        }

        let mut child = command.spawn().with_context(ctx!(
          "Could not start `{}`", line;
          "Ensure that the binary exists and is executable",
        ))?;

        let (stdout, stdout_task) = drain(child.stdout.take().ok_or(anyhow!("No stdout pipe"))?);
        let (stderr, stderr_task) = drain(child.stderr.take().ok_or(anyhow!("No stderr pipe"))?);
        let readers = [stdout_task.abort_handle(), stderr_task.abort_handle()];

        let started = Instant::now();

        match timeout(self.timeout, child.wait()).await {
            Ok(status) => {
                let status = status.with_context(ctx!(
                  "Could not wait for `{}`", line;
                  "",
                ))?;

                // the deadline covers reading the pipes too, a leftover
                // background process may keep them open
                let remaining = self.timeout.saturating_sub(started.elapsed());
                let drained = timeout(remaining, async {
                    let _ = stdout_task.await;
                    let _ = stderr_task.await;
                })
                .await;

                if drained.is_err() {
                    warn!(
                        "`{line}` exited but its output was still open after {}",
                        humantime::format_duration(self.timeout)
                    );

                    readers.iter().for_each(|r| r.abort());
                    return Err(self.timed_out(line, &stdout, &stderr));
                }

                let output = ExecOutput {
                    stdout: take_utf8(&stdout),
                    stderr: take_utf8(&stderr),
                    exit_code: status.code(),
                };

                trace!("`{line}` exited with {:?}", output.exit_code);
                Ok(output)
            }

            Err(_) => {
                warn!(
                    "`{line}` did not finish within {}, killing it",
                    humantime::format_duration(self.timeout)
                );

                if let Err(e) = child.kill().await {
                    warn!("Could not kill `{line}`: {e}");
                }

                let _ = timeout(DRAIN_GRACE, stdout_task).await;
                let _ = timeout(DRAIN_GRACE, stderr_task).await;
                readers.iter().for_each(|r| r.abort());

                Err(self.timed_out(line, &stdout, &stderr))
            }
        }
    }

    fn timed_out(
        &self,
        line: String,
        stdout: &Arc<Mutex<Vec<u8>>>,
        stderr: &Arc<Mutex<Vec<u8>>>,
    ) -> anyhow::Error {
        JobError::Timeout {
            command: line,
            timeout: self.timeout,
            stdout: take_utf8(stdout),
            stderr: take_utf8(stderr),
        }
        .into()
    }

    /// Run the command and fail with [JobError::Execution] unless it exits
    /// with code 0.
    pub async fn run(&self) -> Result<ExecOutput> {
        let output = self.output().await?;

        if output.success() {
            Ok(output)
        } else {
            Err(JobError::Execution {
                command: self.command_line(),
                code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            }
            .into())
        }
    }
}

/// Copy everything `reader` produces into a shared buffer, so that partial
/// output survives a killed process.
fn drain<R>(mut reader: R) -> (Arc<Mutex<Vec<u8>>>, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);

    let task = tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    });

    (buffer, task)
}

/// Lossy utf8 snapshot of a drained buffer.
fn take_utf8(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    buffer
        .lock()
        .map(|buf| String::from_utf8_lossy(&buf).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/exec.rs"]
mod tests;
