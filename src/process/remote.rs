// ABOUTME: ApplicationProcess running on a remote host over a dedicated SSH session.
// ABOUTME: A pump task owns the channel, bridging stdio through in-memory pipes and recording exit status.

use super::wait::poll_exit_status;
use super::{ApplicationProcess, ProcessError, ProcessInput, ProcessOutput, Result};
use crate::ssh::{ExecChannel, Session};
use async_trait::async_trait;
use parking_lot::Mutex;
use russh::{ChannelMsg, Sig};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const REMOTE_POLL_QUANTUM: Duration = Duration::from_millis(500);

const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug)]
pub struct RemoteProcess {
    id: u64,
    remote: String,
    session: tokio::sync::Mutex<Option<Session>>,
    exit_status: OnceLock<i32>,
    status: watch::Receiver<Option<i32>>,
    stdin: Mutex<Option<DuplexStream>>,
    stdout: Mutex<Option<DuplexStream>>,
    stderr: Mutex<Option<DuplexStream>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    orphans_permitted: bool,
    interrupter: CancellationToken,
    closed: AtomicBool,
}

impl RemoteProcess {
    /// Run `command` over `session`, which the process owns from now on.
    ///
    /// The command must print its PID as the first line of stdout. On any
    /// failure the session is disconnected before the error is returned.
    pub async fn start(session: Session, command: &str, orphans_permitted: bool) -> Result<Self> {
        let remote = session.config().target();

        let channel = match session.open_exec(command).await {
            Ok(channel) => channel,
            Err(e) => {
                disconnect(session, &remote).await;
                return Err(e.into());
            }
        };

        let (stdin_writer, stdin_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (stdout_writer, stdout_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_writer, stderr_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (pid_tx, pid_rx) = oneshot::channel();
        let (status_tx, status_rx) = watch::channel(None);
        let shutdown = CancellationToken::new();

        let pump = tokio::spawn(
            Pump {
                channel,
                stdin: stdin_reader,
                stdout: stdout_writer,
                stderr: stderr_writer,
                pid: Some(pid_tx),
                status: status_tx,
                shutdown: shutdown.clone(),
            }
            .run(),
        );

        let timeout = session.config().command_timeout;
        let id = match tokio::time::timeout(timeout, pid_rx).await {
            Ok(Ok(id)) => id,
            _ => {
                shutdown.cancel();
                pump.abort();
                disconnect(session, &remote).await;
                return Err(ProcessError::MissingProcessId);
            }
        };

        tracing::debug!(pid = id, remote = %remote, "Started remote process");

        Ok(Self {
            id,
            remote,
            session: tokio::sync::Mutex::new(Some(session)),
            exit_status: OnceLock::new(),
            status: status_rx,
            stdin: Mutex::new(Some(stdin_writer)),
            stdout: Mutex::new(Some(stdout_reader)),
            stderr: Mutex::new(Some(stderr_reader)),
            pump: Mutex::new(Some(pump)),
            shutdown,
            orphans_permitted,
            interrupter: CancellationToken::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn probe(&self) -> Option<i32> {
        if let Some(status) = self.exit_status.get() {
            return Some(*status);
        }
        let status = (*self.status.borrow())?;
        Some(*self.exit_status.get_or_init(|| status))
    }

    async fn kill(&self) {
        let session = self.session.lock().await;
        let Some(session) = session.as_ref() else {
            return;
        };
        if let Err(e) = session.exec(&format!("kill -9 {}", self.id)).await {
            tracing::warn!(pid = self.id, remote = %self.remote, error = %e, "Failed to kill remote process");
        }
    }

    async fn stop_pump(&self) {
        self.shutdown.cancel();
        let pump = self.pump.lock().take();
        if let Some(mut pump) = pump
            && tokio::time::timeout(REMOTE_POLL_QUANTUM, &mut pump).await.is_err()
        {
            pump.abort();
        }
    }
}

impl Drop for RemoteProcess {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn disconnect(session: Session, remote: &str) {
    if let Err(e) = session.disconnect().await {
        tracing::warn!(remote, error = %e, "Failed to disconnect SSH session");
    }
}

#[async_trait]
impl ApplicationProcess for RemoteProcess {
    fn id(&self) -> u64 {
        self.id
    }

    fn exit_value(&self) -> Option<i32> {
        self.probe()
    }

    async fn wait_for(&self, timeout: Duration) -> Result<Option<i32>> {
        poll_exit_status(self.id, REMOTE_POLL_QUANTUM, timeout, &self.interrupter, || self.probe()).await
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

        self.stdin.lock().take();

        if self.probe().is_none() && !self.orphans_permitted {
            self.kill().await;
            if let Err(e) = poll_exit_status(self.id, REMOTE_POLL_QUANTUM, REMOTE_POLL_QUANTUM, &self.interrupter, || {
                self.probe()
            })
            .await
            {
                tracing::warn!(pid = self.id, error = %e, "Failed to capture exit status on close");
            }
        }

        self.stop_pump().await;

        let session = self.session.lock().await.take();
        if let Some(session) = session {
            disconnect(session, &self.remote).await;
        }

        tracing::debug!(pid = self.id, remote = %self.remote, status = ?self.exit_status.get(), "Closed remote process");
    }

    fn interrupter(&self) -> CancellationToken {
        self.interrupter.clone()
    }
}

/// Bridges one exec channel to the process's in-memory pipes.
struct Pump {
    channel: ExecChannel,
    stdin: DuplexStream,
    stdout: DuplexStream,
    stderr: DuplexStream,
    pid: Option<oneshot::Sender<u64>>,
    status: watch::Sender<Option<i32>>,
    shutdown: CancellationToken,
}

impl Pump {
    async fn run(mut self) {
        let mut buf = vec![0u8; 8192];
        let mut pid_line = Vec::new();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                read = self.stdin.read(&mut buf), if stdin_open => match read {
                    Ok(0) | Err(_) => {
                        stdin_open = false;
                        let _ = self.channel.eof().await;
                    }
                    Ok(n) => {
                        if let Err(e) = self.channel.data(&buf[..n]).await {
                            tracing::debug!(error = %e, "Remote stdin closed");
                            stdin_open = false;
                        }
                    }
                },

                msg = self.channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        let output = self.take_pid_line(&data, &mut pid_line);
                        if !output.is_empty() {
                            let _ = self.stdout.write_all(output).await;
                        }
                    }
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        let _ = self.stderr.write_all(&data).await;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        self.status.send_replace(Some(i32::try_from(exit_status).unwrap_or(i32::MAX)));
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        self.status.send_replace(Some(128 + signal_number(&signal_name)));
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                },
            }
        }

        let _ = self.channel.close().await;
    }

    /// Consume the leading PID line; returns the bytes that belong to stdout.
    fn take_pid_line<'a>(&mut self, data: &'a [u8], pid_line: &mut Vec<u8>) -> &'a [u8] {
        let Some(tx) = self.pid.take() else {
            return data;
        };

        match data.iter().position(|b| *b == b'\n') {
            Some(end) => {
                pid_line.extend_from_slice(&data[..end]);
                match String::from_utf8_lossy(pid_line).trim().parse::<u64>() {
                    Ok(pid) => {
                        let _ = tx.send(pid);
                    }
                    Err(_) => tracing::warn!(line = %String::from_utf8_lossy(pid_line), "Remote process id line is not a number"),
                }
                &data[end + 1..]
            }
            None => {
                pid_line.extend_from_slice(data);
                self.pid = Some(tx);
                &[]
            }
        }
    }
}

fn signal_number(signal: &Sig) -> i32 {
    match signal {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_map_to_shell_numbers() {
        assert_eq!(128 + signal_number(&Sig::KILL), 137);
        assert_eq!(128 + signal_number(&Sig::TERM), 143);
    }
}
