//! Test command description and process execution
//!
//! A [`TestCommand`] names the external test runner invocation. An
//! [`Executor`] runs it to completion and hands back a [`RunResult`] with
//! everything the child wrote; a failing exit status is an ordinary result,
//! never an error.

use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Test title selected by the default mocha invocation
pub const DEFAULT_GREP: &str = "should report the correct number of URL copy events";

/// An external test runner invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCommand {
    /// Program to launch (looked up on `PATH`)
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory, inherited when `None`
    pub current_dir: Option<PathBuf>,
}

impl TestCommand {
    /// Create a command with no arguments
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command from `dir`
    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// `npm run --silent test -- --grep <grep> --reporter json`
    #[must_use]
    pub fn mocha(grep: &str) -> Self {
        Self::new("npm").args([
            "run",
            "--silent",
            "test",
            "--",
            "--grep",
            grep,
            "--reporter",
            "json",
        ])
    }

    /// `cargo test -- --exact <name> -Z unstable-options --format json`
    ///
    /// libtest's JSON output is still unstable, so this needs a nightly
    /// toolchain or `RUSTC_BOOTSTRAP=1`.
    #[must_use]
    pub fn libtest(name: &str) -> Self {
        Self::new("cargo").args([
            "test",
            "--",
            "--exact",
            name,
            "-Z",
            "unstable-options",
            "--format",
            "json",
        ])
    }

    /// Build a command from a full argv (program first)
    ///
    /// # Errors
    ///
    /// Returns an error if `argv` is empty or the program is blank
    pub fn from_argv(argv: &[String]) -> HarnessResult<Self> {
        match argv.split_first() {
            Some((program, rest)) if !program.trim().is_empty() => {
                Ok(Self::new(program.clone()).args(rest.iter().cloned()))
            }
            _ => Err(HarnessError::invalid_config("test command is empty")),
        }
    }
}

impl fmt::Display for TestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of one test command invocation
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Everything written to stdout
    pub stdout: String,
    /// Everything written to stderr
    pub stderr: String,
    /// When the process was launched
    pub started_at: Instant,
    /// When the process had fully terminated
    pub finished_at: Instant,
}

impl RunResult {
    /// Whether the process exited with status zero
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Wall-clock time the invocation took
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }
}

/// Runs a [`TestCommand`] to completion
///
/// # Implementations
///
/// - [`ProcessExecutor`] - spawns a real child process
/// - test stubs that return canned output
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the command and capture its output
    async fn execute(&self, command: &TestCommand) -> HarnessResult<RunResult>;
}

/// Executor backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    /// Create an executor without a timeout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child if it runs longer than `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured timeout
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, command: &TestCommand) -> HarnessResult<RunResult> {
        let mut std_cmd = std::process::Command::new(&command.program);
        std_cmd
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = command.current_dir {
            std_cmd.current_dir(dir);
        }
        // The child leads its own process group so a timeout reaches every descendant.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.kill_on_drop(true);

        debug!(command = %command, "spawning test command");
        let started_at = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| HarnessError::spawn(&command.program, e))?;
        // Taken now: the id is gone once the child is reaped, but its group lives on.
        let pgid = child.id();
        let mut stdout = collect_pipe(child.stdout.take());
        let mut stderr = collect_pipe(child.stderr.take());

        let finished = match self.timeout {
            Some(limit) => {
                let waited =
                    tokio::time::timeout(limit, wait_for_exit(&mut child, &mut stdout, &mut stderr))
                        .await;
                match waited {
                    Ok(finished) => finished,
                    Err(_) => {
                        terminate(&mut child, pgid, &mut stdout, &mut stderr).await;
                        return Err(HarnessError::timeout(
                            &command.program,
                            limit.as_millis() as u64,
                        ));
                    }
                }
            }
            None => wait_for_exit(&mut child, &mut stdout, &mut stderr).await,
        };
        let (status, stdout, stderr) = finished?;

        Ok(RunResult {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            started_at,
            finished_at: Instant::now(),
        })
    }
}

/// How long killed descendants get to release the output pipes
const PIPE_RELEASE_GRACE: Duration = Duration::from_secs(2);

type PipeReader = JoinHandle<io::Result<Vec<u8>>>;

fn collect_pipe<R>(pipe: Option<R>) -> PipeReader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn join_pipe(reader: &mut PipeReader) -> io::Result<Vec<u8>> {
    reader.await.map_err(io::Error::other)?
}

/// Exit status plus everything written until the pipes closed
async fn wait_for_exit(
    child: &mut Child,
    stdout: &mut PipeReader,
    stderr: &mut PipeReader,
) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let status = child.wait().await?;
    let stdout = join_pipe(stdout).await?;
    let stderr = join_pipe(stderr).await?;
    Ok((status, stdout, stderr))
}

/// Kill the child's process group, reap the child, and wait for the pipes
/// to close, which happens once every process holding them has exited.
async fn terminate(
    child: &mut Child,
    pgid: Option<u32>,
    stdout: &mut PipeReader,
    stderr: &mut PipeReader,
) {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pgid) = pgid.and_then(|pid| i32::try_from(pid).ok()) {
            match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(pgid, error = %e, "failed to kill process group"),
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pgid;
        if let Err(e) = child.start_kill() {
            warn!(error = %e, "failed to kill test command");
        }
    }

    if let Err(e) = child.wait().await {
        warn!(error = %e, "failed to reap test command");
    }

    let released = tokio::time::timeout(PIPE_RELEASE_GRACE, async {
        drain(stdout).await;
        drain(stderr).await;
    })
    .await;
    if released.is_err() {
        warn!("output pipes still open after kill; a descendant left the process group");
        stdout.abort();
        stderr.abort();
    }
}

/// Wait for a reader whose output is no longer wanted
async fn drain(reader: &mut PipeReader) {
    // A finished handle may already have been polled to completion.
    if !reader.is_finished() {
        let _ = join_pipe(reader).await;
    }
}
