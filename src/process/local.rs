// ABOUTME: ApplicationProcess backed by a tokio child process on this host.
// ABOUTME: Captures stdio at spawn time and kills the child on close unless orphans are permitted.

use super::wait::poll_exit_status;
use super::{ApplicationProcess, ProcessError, ProcessInput, ProcessOutput, Result};
use crate::terminal::LaunchCommand;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

pub const LOCAL_POLL_QUANTUM: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct LocalProcess {
    id: u64,
    program: String,
    child: Mutex<Option<Child>>,
    exit_status: OnceLock<i32>,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<Option<ChildStdout>>,
    stderr: Mutex<Option<ChildStderr>>,
    orphans_permitted: bool,
    interrupter: CancellationToken,
    closed: AtomicBool,
}

impl LocalProcess {
    /// Spawn `command` with all three standard streams piped.
    pub fn spawn(command: &LaunchCommand) -> Result<Self> {
        let mut cmd = Command::new(&command.executable);
        cmd.args(&command.arguments)
            .envs(&command.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(!command.orphans_permitted);
        if let Some(dir) = &command.working_directory {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: command.executable.clone(),
            source,
        })?;

        let streams = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let ((Some(stdin), Some(stdout), Some(stderr)), Some(id)) = (streams, child.id()) else {
            let _ = child.start_kill();
            return Err(ProcessError::StreamUnavailable("standard streams"));
        };

        tracing::debug!(pid = id, program = %command.executable, "Spawned local process");

        Ok(Self {
            id: u64::from(id),
            program: command.executable.clone(),
            child: Mutex::new(Some(child)),
            exit_status: OnceLock::new(),
            stdin: Mutex::new(Some(stdin)),
            stdout: Mutex::new(Some(stdout)),
            stderr: Mutex::new(Some(stderr)),
            orphans_permitted: command.orphans_permitted,
            interrupter: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn probe(&self) -> Option<i32> {
        if let Some(status) = self.exit_status.get() {
            return Some(*status);
        }

        let status = match self.child.lock().as_mut()?.try_wait() {
            Ok(Some(status)) => exit_code(status),
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(pid = self.id, error = %e, "Failed to query exit status");
                return None;
            }
        };
        Some(*self.exit_status.get_or_init(|| status))
    }

    async fn kill(&self) {
        let child = self.child.lock().take();
        let Some(mut child) = child else {
            return;
        };

        match child.kill().await {
            Ok(()) => {
                if let Ok(Some(status)) = child.try_wait() {
                    let _ = self.exit_status.set(exit_code(status));
                }
            }
            Err(e) => tracing::warn!(pid = self.id, error = %e, "Failed to kill local process"),
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[async_trait]
impl ApplicationProcess for LocalProcess {
    fn id(&self) -> u64 {
        self.id
    }

    fn exit_value(&self) -> Option<i32> {
        self.probe()
    }

    async fn wait_for(&self, timeout: Duration) -> Result<Option<i32>> {
        poll_exit_status(self.id, LOCAL_POLL_QUANTUM, timeout, &self.interrupter, || self.probe()).await
    }

    fn take_stdin(&self) -> Option<ProcessInput> {
        self.stdin.lock().take().map(|s| Box::new(s) as ProcessInput)
    }

    fn take_stdout(&self) -> Option<ProcessOutput> {
        self.stdout.lock().take().map(|s| Box::new(s) as ProcessOutput)
    }

    fn take_stderr(&self) -> Option<ProcessOutput> {
        self.stderr.lock().take().map(|s| Box::new(s) as ProcessOutput)
    }

    async fn destroy(&self) {
        if self.probe().is_none() {
            self.kill().await;
        }
        self.close().await;
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Closing stdin lets well-behaved children exit on their own
        self.stdin.lock().take();

        let status = self.probe();
        if status.is_none() && !self.orphans_permitted {
            self.kill().await;
        } else {
            // Dropping the child leaves it running when orphans are permitted
            self.child.lock().take();
        }

        tracing::debug!(pid = self.id, program = %self.program, status = ?self.exit_status.get(), "Closed local process");
    }

    fn interrupter(&self) -> CancellationToken {
        self.interrupter.clone()
    }
}
