//! Process supervision under a wall-clock deadline.
//!
//! One call to [`run`] spawns exactly one child, drains its stdout and stderr
//! concurrently, and races the child's exit against the deadline. On expiry
//! the child's process group gets SIGTERM, then SIGKILL if it is still alive
//! after the grace period.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Exit code reported when the OS gives none (signal death, spawn failure).
pub const FALLBACK_EXIT_CODE: i32 = 1;

/// Deadline and kill escalation for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall-clock budget, measured from spawn.
    pub deadline: Duration,
    /// Time between SIGTERM and SIGKILL, and the longest we wait for
    /// output pipes to close once the child is gone.
    pub kill_grace: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(10_000),
            kill_grace: Duration::from_millis(500),
        }
    }
}

/// How the child's lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own before the deadline (any exit code).
    Completed,
    /// Still running at the deadline and was terminated.
    KilledOnTimeout,
    /// Never started.
    FailedToStart,
}

/// Raw result of one supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub termination: Termination,
}

impl ExecutionOutcome {
    pub fn timed_out(&self) -> bool {
        self.termination == Termination::KilledOnTimeout
    }

    fn failed_to_start(err: &std::io::Error) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Failed to start process: {err}"),
            exit_code: FALLBACK_EXIT_CODE,
            termination: Termination::FailedToStart,
        }
    }
}

/// Line appended to stderr when the deadline fires.
pub fn timeout_notice(deadline: Duration) -> String {
    let ms = deadline.as_millis();
    if ms % 1000 == 0 {
        format!("\n[Execution timed out after {} seconds]", ms / 1000)
    } else {
        format!("\n[Execution timed out after {ms} ms]")
    }
}

/// Run `command` with `args` (no shell) until it exits or the deadline passes.
pub async fn run<S: AsRef<OsStr>>(
    command: &str,
    args: &[S],
    limits: ExecutionLimits,
) -> ExecutionOutcome {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so a timeout reaches grandchildren (e.g. `go run`).
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to spawn process");
            return ExecutionOutcome::failed_to_start(&e);
        }
    };
    debug!(command = %command, pid = ?child.id(), "Process spawned");

    let (stop_tx, stop_rx) = watch::channel(false);
    let stdout_task = child.stdout.take().map(|s| spawn_drain(s, stop_rx.clone()));
    let stderr_task = child.stderr.take().map(|s| spawn_drain(s, stop_rx));

    let (status, termination) = match tokio::time::timeout(limits.deadline, child.wait()).await {
        Ok(status) => (status, Termination::Completed),
        Err(_) => {
            debug!(deadline = ?limits.deadline, "Deadline reached, terminating");
            (terminate(&mut child, limits.kill_grace).await, Termination::KilledOnTimeout)
        }
    };

    // Pipes normally close with the child; a detached grandchild may hold them.
    let linger = tokio::spawn(async move {
        tokio::time::sleep(limits.kill_grace).await;
        let _ = stop_tx.send(true);
    });
    let (stdout, mut stderr) = tokio::join!(collect(stdout_task), collect(stderr_task));
    linger.abort();

    let exit_code = match status {
        Ok(status) => exit_code(status),
        Err(e) => {
            warn!(error = %e, "Failed to wait for process");
            stderr.push_str(&format!("\nFailed to wait for process: {e}"));
            FALLBACK_EXIT_CODE
        }
    };

    if termination == Termination::KilledOnTimeout {
        stderr.push_str(&timeout_notice(limits.deadline));
    }

    debug!(exit_code, ?termination, "Process finished");

    ExecutionOutcome {
        stdout,
        stderr,
        exit_code,
        termination,
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(FALLBACK_EXIT_CODE)
}

/// SIGTERM the child's group, escalating to SIGKILL after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    signal_group(child, GroupSignal::Terminate);
    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status;
    }

    warn!(grace = ?grace, "Process ignored SIGTERM, killing");
    signal_group(child, GroupSignal::Kill);
    // Reaches the direct child even if it left the group.
    let _ = child.start_kill();
    child.wait().await
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &mut Child, signal: GroupSignal) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    let sig = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    if let Err(e) = killpg(Pid::from_raw(pid), sig) {
        debug!(pid, signal = ?sig, error = %e, "Failed to signal process group");
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _signal: GroupSignal) {
    let _ = child.start_kill();
}

/// Read `reader` to EOF, or until `stop` flips, keeping what was read.
fn spawn_drain<R>(mut reader: R, mut stop: watch::Receiver<bool>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            tokio::select! {
                read = reader.read(&mut chunk) => match read {
                    Ok(0) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(error = %e, "Output stream read failed");
                        break;
                    }
                },
                _ = stop.changed() => break,
            }
        }
        buf
    })
}

async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(task) = task else {
        return String::new();
    };
    match task.await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(error = %e, "Output drain task failed");
            String::new()
        }
    }
}
