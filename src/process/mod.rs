// ABOUTME: Handles for running local or remote OS processes.
// ABOUTME: Exit status is captured exactly once; waits poll in fixed quanta and honor interruption.

mod error;
mod local;
mod remote;
mod wait;

pub use error::{ProcessError, Result};
pub use local::{LOCAL_POLL_QUANTUM, LocalProcess};
pub use remote::{REMOTE_POLL_QUANTUM, RemoteProcess};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Writable end of a process's standard input.
pub type ProcessInput = Box<dyn AsyncWrite + Send + Unpin>;

/// Readable end of a process's standard output or error.
pub type ProcessOutput = Box<dyn AsyncRead + Send + Unpin>;

/// A process started by a [`Terminal`](crate::terminal::Terminal).
///
/// Streams are wired when the process is constructed and can each be taken
/// once. The exit status moves from unknown to a concrete value at most once.
#[async_trait]
pub trait ApplicationProcess: fmt::Debug + Send + Sync {
    /// Operating system process id (the remote PID for remote processes).
    fn id(&self) -> u64;

    /// The exit status if the process has terminated, without blocking.
    fn exit_value(&self) -> Option<i32>;

    /// Wait up to `timeout` for the process to exit.
    ///
    /// Returns `Ok(None)` when the timeout elapses first and
    /// [`ProcessError::Interrupted`] when the [`interrupter`](Self::interrupter)
    /// is cancelled during the wait.
    async fn wait_for(&self, timeout: Duration) -> Result<Option<i32>>;

    /// Wait until the process exits.
    async fn wait(&self) -> Result<i32> {
        loop {
            if let Some(status) = self.wait_for(Duration::from_secs(60)).await? {
                return Ok(status);
            }
        }
    }

    fn take_stdin(&self) -> Option<ProcessInput>;

    fn take_stdout(&self) -> Option<ProcessOutput>;

    fn take_stderr(&self) -> Option<ProcessOutput>;

    /// Terminate the process, then [`close`](Self::close) it.
    async fn destroy(&self);

    /// Capture the exit status if possible and release every resource.
    ///
    /// Never fails; a still-running process is terminated unless orphans
    /// were permitted when it was launched. Calling it again does nothing.
    async fn close(&self);

    /// Token that interrupts any wait in progress when cancelled.
    fn interrupter(&self) -> CancellationToken;
}
