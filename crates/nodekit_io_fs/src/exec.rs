//! External command execution with a bounded timeout.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::conf::N_POLL_INTERVAL_EXECUTE;
use crate::spec::ErrorExecute;

/// Capability to run one command and capture its standard output.
///
/// Implementations must either return the complete stdout of a successful
/// run or fail; a partially collected output is never returned.
pub trait CommandExecutor {
    /// Run `command` with `args`, giving up after `timeout`.
    fn execute(
        &self,
        command: &OsStr,
        args: &[&OsStr],
        timeout: Duration,
    ) -> Result<Vec<u8>, ErrorExecute>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn execute(
        &self,
        command: &OsStr,
        args: &[&OsStr],
        timeout: Duration,
    ) -> Result<Vec<u8>, ErrorExecute> {
        (**self).execute(command, args, timeout)
    }
}

/// [`CommandExecutor`] backed by a real child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    envs: Vec<(OsString, OsString)>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one environment variable to every spawned child.
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute(
        &self,
        command: &OsStr,
        args: &[&OsStr],
        timeout: Duration,
    ) -> Result<Vec<u8>, ErrorExecute> {
        let c_command = command.to_string_lossy().to_string();
        debug!(command = %c_command, ?args, ?timeout, "executing command");

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a timeout also reaches forked descendants.
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(|source| ErrorExecute::Spawn {
            command: c_command.clone(),
            source,
        })?;
        let n_pid = child.id();

        // Drain both pipes while polling; a full pipe buffer stalls the child.
        let rx_stdout = spawn_pipe_reader(child.stdout.take());
        let rx_stderr = spawn_pipe_reader(child.stderr.take());

        let t_deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let t_now = Instant::now();
                    if t_now >= t_deadline {
                        terminate(&mut child);
                        return Err(timed_out(c_command, timeout));
                    }
                    thread::sleep(N_POLL_INTERVAL_EXECUTE.min(t_deadline - t_now));
                }
                Err(source) => {
                    terminate(&mut child);
                    return Err(ErrorExecute::Io {
                        command: c_command,
                        source,
                    });
                }
            }
        };

        // Descendants may still hold the pipes open after the child exits.
        let raw_stdout = recv_pipe_output(&rx_stdout, t_deadline, n_pid, &c_command, timeout)?;
        let raw_stderr = recv_pipe_output(&rx_stderr, t_deadline, n_pid, &c_command, timeout)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&raw_stderr).trim().to_string();
            debug!(command = %c_command, %status, %stderr, "command failed");
            return Err(ErrorExecute::ExitFailure {
                command: c_command,
                status,
                stderr,
            });
        }
        Ok(raw_stdout)
    }
}

fn timed_out(command: String, timeout: Duration) -> ErrorExecute {
    warn!(command = %command, ?timeout, "command timed out");
    ErrorExecute::Timeout { command, timeout }
}

fn terminate(child: &mut Child) {
    kill_process_group(child.id());
    // The child may already have exited between the poll and the kill.
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_process_group(n_pid: u32) {
    let Ok(n_pgid) = libc::pid_t::try_from(n_pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created at spawn.
    unsafe {
        let _ = libc::killpg(n_pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_n_pid: u32) {}

fn spawn_pipe_reader<R>(pipe: Option<R>) -> mpsc::Receiver<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let res_read = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(res_read);
    });
    rx
}

fn recv_pipe_output(
    rx: &mpsc::Receiver<io::Result<Vec<u8>>>,
    t_deadline: Instant,
    n_pid: u32,
    command: &str,
    timeout: Duration,
) -> Result<Vec<u8>, ErrorExecute> {
    let res_read = match rx.recv_timeout(t_deadline.saturating_duration_since(Instant::now())) {
        Ok(res_read) => res_read,
        Err(RecvTimeoutError::Timeout) => {
            kill_process_group(n_pid);
            return Err(timed_out(command.to_string(), timeout));
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(io::Error::other("pipe reader thread exited without output"))
        }
    };
    res_read.map_err(|source| ErrorExecute::Io {
        command: command.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::time::{Duration, Instant};

    use super::{CommandExecutor, ProcessExecutor};
    use crate::spec::ErrorExecute;

    fn run(command: &str, args: &[&str], timeout: Duration) -> Result<Vec<u8>, ErrorExecute> {
        let l_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();
        ProcessExecutor::new().execute(OsStr::new(command), &l_args, timeout)
    }

    #[test]
    fn execute_missing_binary_fails_to_spawn() {
        let err = run(
            "nodekit-definitely-not-a-binary",
            &[],
            Duration::from_secs(5),
        )
        .expect_err("missing binary must fail");
        assert!(matches!(err, ErrorExecute::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn execute_captures_stdout() {
        let raw = run("sh", &["-c", "printf 'hello'"], Duration::from_secs(5)).expect("run sh");
        assert_eq!(raw, b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn execute_non_zero_exit_reports_stderr() {
        let err = run("sh", &["-c", "echo boom >&2; exit 3"], Duration::from_secs(5))
            .expect_err("non-zero exit must fail");
        match err {
            ErrorExecute::ExitFailure { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn execute_timeout_kills_child() {
        let t_start = Instant::now();
        let err = run("sleep", &["5"], Duration::from_millis(100))
            .expect_err("sleep must time out");
        assert!(matches!(err, ErrorExecute::Timeout { .. }));
        assert!(t_start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn execute_timeout_covers_descendants_holding_output() {
        let t_start = Instant::now();
        let err = run("sh", &["-c", "sleep 3 & printf hi"], Duration::from_millis(300))
            .expect_err("background descendant must not outlive the timeout");
        assert!(matches!(err, ErrorExecute::Timeout { .. }));
        assert!(t_start.elapsed() < Duration::from_secs(1));
    }

    #[cfg(unix)]
    #[test]
    fn execute_passes_extra_env() {
        let l_args = [OsStr::new("-c"), OsStr::new("printf '%s' \"$NODEKIT_PROBE\"")];
        let raw = ProcessExecutor::new()
            .with_env("NODEKIT_PROBE", "on")
            .execute(OsStr::new("sh"), &l_args, Duration::from_secs(5))
            .expect("run sh");
        assert_eq!(raw, b"on");
    }
}
