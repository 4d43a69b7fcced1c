//! Subprocess execution
//!
//! Launches an external interpreter, captures its output in memory and
//! enforces a hard timeout. A non-zero exit or a timeout is an ordinary
//! result; only failing to launch or wait on the process is an error.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// How long to wait for output pipes to drain after a forced kill
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Process executor errors
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A command to run: interpreter, arguments, environment overlay, timeout
#[derive(Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout,
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

    pub fn envs(mut self, vars: Vec<(String, String)>) -> Self {
        self.env.extend(vars);
        self
    }
}

// Environment values may carry credentials, so only keys are printed.
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env_keys", &keys)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Captured outcome of one subprocess
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Exit code for reporting; signal terminations show as -1
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }
}

/// Something that can run a [`CommandSpec`]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, spec: &CommandSpec) -> Result<ProcessOutput, ExecError>;
}

/// Executor backed by real OS processes
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, spec: &CommandSpec) -> Result<ProcessOutput, ExecError> {
        debug!("Spawning {:?}", spec);

        let mut base = std::process::Command::new(&spec.program);
        base.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        // Own process group, so a timeout can take down everything the test started
        #[cfg(unix)]
        base.process_group(0);

        let mut child = Command::from(base)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let (exit_code, timed_out) = match tokio::time::timeout(spec.timeout, child.wait()).await
        {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(source)) => {
                return Err(ExecError::Wait {
                    program: spec.program.clone(),
                    source,
                })
            }
            Err(_) => {
                warn!(
                    "'{}' exceeded {}s, killing",
                    spec.program,
                    spec.timeout.as_secs()
                );
                terminate(&mut child, &spec.program).await;
                (None, true)
            }
        };

        let (stdout, stderr) = if timed_out {
            tokio::join!(drain_with_grace(stdout), drain_with_grace(stderr))
        } else {
            (join_reader(stdout).await, join_reader(stderr).await)
        };

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
        })
    }
}

/// Kill the child's whole process group, then the child itself
async fn terminate(child: &mut Child, program: &str) {
    if let Some(pid) = child.id() {
        kill_group(pid, program);
    }

    // kill() also reaps the child, so no zombie is left behind
    if let Err(e) = child.kill().await {
        warn!("Failed to kill '{}': {}", program, e);
    }
}

#[cfg(unix)]
fn kill_group(pid: u32, program: &str) {
    // the child leads its own group, so its pid is the group id
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        warn!("Failed to kill process group of '{}': {}", program, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32, _program: &str) {}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                debug!("Pipe read ended early: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn join_reader(handle: JoinHandle<String>) -> String {
    handle.await.unwrap_or_default()
}

// A descendant that left the process group may still hold the pipe open.
async fn drain_with_grace(mut handle: JoinHandle<String>) -> String {
    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str, timeout: Duration) -> CommandSpec {
        CommandSpec::new("sh", timeout).args(["-c", script])
    }

    #[tokio::test]
    async fn test_captures_exit_code_and_streams() {
        let spec = sh("echo out; echo err >&2; exit 3", Duration::from_secs(10));
        let output = ProcessExecutor::new().execute(&spec).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.timed_out);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_environment_overlay() {
        let spec = sh("printf %s \"$PGPASSWORD\"", Duration::from_secs(10))
            .envs(vec![("PGPASSWORD".to_string(), "s3cret".to_string())]);
        let output = ProcessExecutor::new().execute(&spec).await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "s3cret");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let spec = CommandSpec::new("sleep", Duration::from_millis(200)).arg("30");
        let started = Instant::now();
        let output = ProcessExecutor::new().execute(&spec).await.unwrap();

        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
        assert_eq!(output.code(), -1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    fn is_alive(pid: i32) -> bool {
        if nix::sys::signal::kill(Pid::from_raw(pid), None).is_err() {
            return false;
        }
        // an exited but unreaped process still accepts signal 0
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("sleeper.pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
        let spec = sh(&script, Duration::from_millis(500));

        let started = Instant::now();
        let output = ProcessExecutor::new().execute(&spec).await.unwrap();
        assert!(output.timed_out);
        assert!(started.elapsed() < DRAIN_GRACE);

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while is_alive(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!is_alive(pid), "sleep {pid} outlived the timeout");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let spec = CommandSpec::new("/nonexistent/interpreter", Duration::from_secs(1));
        let err = ProcessExecutor::new().execute(&spec).await.unwrap_err();

        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/interpreter"));
    }

    #[test]
    fn test_debug_hides_env_values() {
        let spec = CommandSpec::new("psql", Duration::from_secs(1))
            .envs(vec![("PGPASSWORD".to_string(), "hunter2".to_string())]);
        let debug = format!("{spec:?}");
        assert!(debug.contains("PGPASSWORD"));
        assert!(!debug.contains("hunter2"));
    }
}
