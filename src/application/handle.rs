// ABOUTME: The Application handle: one process, its listeners, console pumps and diagnostics.
// ABOUTME: Close and destroy are serialized and idempotent, firing each listener callback once.

use super::console::{ApplicationConsole, StreamName};
use super::listener::{ApplicationListener, LifecycleEvent};
use crate::deferred::BoxError;
use crate::diagnostics::{Diagnostics, Warning};
use crate::platform::Platform;
use crate::process::{ApplicationProcess, ProcessOutput, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

/// How long close waits for console pumps to drain before aborting them.
const CONSOLE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Realized,
    Closing,
    Closed,
}

/// A secondary connection owned by an application, such as a management channel.
#[async_trait]
pub trait AuxiliaryChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn close(&self) -> std::result::Result<(), BoxError>;
}

/// A running application.
pub struct Application {
    name: String,
    process: Arc<dyn ApplicationProcess>,
    platform: Arc<Platform>,
    environment: BTreeMap<String, String>,
    listeners: Vec<Arc<dyn ApplicationListener>>,
    lifecycle: Mutex<Lifecycle>,
    close_lock: tokio::sync::Mutex<()>,
    auxiliaries: Mutex<Vec<Box<dyn AuxiliaryChannel>>>,
    console_tasks: Mutex<Vec<JoinHandle<()>>>,
    diagnostics: Arc<Mutex<Diagnostics>>,
    realized_at: DateTime<Utc>,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("process", &self.process)
            .field("platform", &self.platform.name())
            .field("lifecycle", &*self.lifecycle.lock())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Wrap a started process, start pumping its output and notify `on_realized`.
    pub(crate) fn realized(
        name: impl Into<String>,
        process: Arc<dyn ApplicationProcess>,
        platform: Arc<Platform>,
        environment: BTreeMap<String, String>,
        listeners: Vec<Arc<dyn ApplicationListener>>,
        console: Arc<dyn ApplicationConsole>,
    ) -> Self {
        let name = name.into();
        let diagnostics = Arc::new(Mutex::new(Diagnostics::default()));

        let mut console_tasks = Vec::with_capacity(2);
        if let Some(stdout) = process.take_stdout() {
            console_tasks.push(pump_console(&name, stdout, StreamName::Stdout, &console, &diagnostics));
        }
        if let Some(stderr) = process.take_stderr() {
            console_tasks.push(pump_console(&name, stderr, StreamName::Stderr, &console, &diagnostics));
        }

        let application = Self {
            name,
            process,
            platform,
            environment,
            listeners,
            lifecycle: Mutex::new(Lifecycle::Realized),
            close_lock: tokio::sync::Mutex::new(()),
            auxiliaries: Mutex::new(Vec::new()),
            console_tasks: Mutex::new(console_tasks),
            diagnostics,
            realized_at: Utc::now(),
        };

        tracing::info!(application = %application.name, pid = application.id(), platform = %application.platform.name(), "Application realized");
        application.fire(LifecycleEvent::Realized);
        application
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process id of the underlying process.
    pub fn id(&self) -> u64 {
        self.process.id()
    }

    pub fn process(&self) -> &Arc<dyn ApplicationProcess> {
        &self.process
    }

    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// The environment the process was launched with.
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle() == Lifecycle::Closed
    }

    pub fn realized_at(&self) -> DateTime<Utc> {
        self.realized_at
    }

    pub fn exit_value(&self) -> Option<i32> {
        self.process.exit_value()
    }

    pub async fn wait_for(&self, timeout: Duration) -> Result<Option<i32>> {
        self.process.wait_for(timeout).await
    }

    pub async fn wait(&self) -> Result<i32> {
        self.process.wait().await
    }

    /// Snapshot of the warnings recorded so far.
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.lock().clone()
    }

    /// Attach a channel that is closed together with the application.
    pub fn add_auxiliary(&self, channel: Box<dyn AuxiliaryChannel>) {
        self.auxiliaries.lock().push(channel);
    }

    /// Close the application, terminating the process unless orphans are permitted.
    pub async fn close(&self) {
        self.shutdown(false).await;
    }

    /// Terminate the process, then close the application.
    pub async fn destroy(&self) {
        self.shutdown(true).await;
    }

    async fn shutdown(&self, destroy: bool) {
        let _serialized = self.close_lock.lock().await;
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle != Lifecycle::Realized {
                return;
            }
            *lifecycle = Lifecycle::Closing;
        }

        tracing::info!(application = %self.name, destroy, "Closing application");
        self.fire(LifecycleEvent::Closing);

        let auxiliaries: Vec<_> = self.auxiliaries.lock().drain(..).collect();
        for auxiliary in auxiliaries {
            if let Err(e) = auxiliary.close().await {
                self.diagnostics.lock().warn(Warning::auxiliary_close(format!(
                    "failed to close {} of {}: {e}",
                    auxiliary.name(),
                    self.name
                )));
            }
        }

        if destroy {
            self.process.destroy().await;
        } else {
            self.process.close().await;
        }

        let tasks: Vec<_> = self.console_tasks.lock().drain(..).collect();
        for mut task in tasks {
            if tokio::time::timeout(CONSOLE_DRAIN_TIMEOUT, &mut task).await.is_err() {
                task.abort();
            }
        }

        *self.lifecycle.lock() = Lifecycle::Closed;
        tracing::info!(application = %self.name, status = ?self.exit_value(), "Application closed");
        self.fire(LifecycleEvent::Closed);
    }

    fn fire(&self, event: LifecycleEvent) {
        for listener in &self.listeners {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| listener.dispatch(event, self)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            self.diagnostics.lock().warn(Warning::listener_failed(format!(
                "{event} listener for {} failed: {failure}",
                self.name
            )));
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

fn pump_console(
    application: &str,
    output: ProcessOutput,
    stream: StreamName,
    console: &Arc<dyn ApplicationConsole>,
    diagnostics: &Arc<Mutex<Diagnostics>>,
) -> JoinHandle<()> {
    let application = application.to_string();
    let console = Arc::clone(console);
    let diagnostics = Arc::clone(diagnostics);

    tokio::spawn(async move {
        let mut lines = BufReader::new(output).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => console.write_line(&application, stream, &line),
                Ok(None) => break,
                Err(e) => {
                    diagnostics
                        .lock()
                        .warn(Warning::console(format!("reading {stream} of {application}: {e}")));
                    break;
                }
            }
        }
    })
}
