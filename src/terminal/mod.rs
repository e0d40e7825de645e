// ABOUTME: Terminals turn a launch command into a running ApplicationProcess.
// ABOUTME: LocalTerminal spawns on this host; RemoteTerminal runs each command over its own SSH session.

mod local;
mod remote;

pub use local::LocalTerminal;
pub use remote::RemoteTerminal;

use crate::process::{ApplicationProcess, Result};
use crate::ssh::quote;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything needed to start one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchCommand {
    pub executable: String,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
    /// Leave the process running when its handle is closed.
    pub orphans_permitted: bool,
}

impl LaunchCommand {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn orphans_permitted(mut self, permitted: bool) -> Self {
        self.orphans_permitted = permitted;
        self
    }

    /// POSIX shell line that prints the shell's PID, then execs the program.
    ///
    /// ```
    /// use foreman::terminal::LaunchCommand;
    ///
    /// let line = LaunchCommand::new("sleep").arg("5").working_directory("/tmp").env("A", "1").to_remote_shell();
    /// assert_eq!(line, "cd '/tmp' && echo $$ && exec env 'A=1' 'sleep' '5'");
    /// ```
    pub fn to_remote_shell(&self) -> String {
        let mut line = String::new();
        if let Some(dir) = &self.working_directory {
            line.push_str(&format!("cd {} && ", quote(&dir.to_string_lossy())));
        }
        line.push_str("echo $$ && exec env");
        for (key, value) in &self.environment {
            line.push(' ');
            line.push_str(&quote(&format!("{key}={value}")));
        }
        line.push(' ');
        line.push_str(&quote(&self.executable));
        for argument in &self.arguments {
            line.push(' ');
            line.push_str(&quote(argument));
        }
        line
    }
}

/// Starts processes and prepares their file system.
#[async_trait]
pub trait Terminal: Send + Sync {
    /// Start `command` with its standard streams captured.
    ///
    /// Nothing is left running or connected when this fails.
    async fn realize(&self, command: &LaunchCommand) -> Result<Arc<dyn ApplicationProcess>>;

    /// Create `path` and any missing parents; succeeds if it already exists.
    async fn make_directories(&self, path: &Path) -> Result<()>;

    /// Copy a local file to `destination` on the terminal's host.
    async fn upload(&self, source: &Path, destination: &Path) -> Result<()>;
}
