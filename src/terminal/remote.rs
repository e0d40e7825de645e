// ABOUTME: Terminal that runs commands on a remote host over SSH.
// ABOUTME: Each realized process owns a fresh session; housekeeping commands use short-lived ones.

use super::{LaunchCommand, Terminal};
use crate::process::{ApplicationProcess, RemoteProcess, Result};
use crate::ssh::{Session, SessionConfig};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RemoteTerminal {
    config: SessionConfig,
}

impl RemoteTerminal {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn release(&self, session: Session) {
        if let Err(e) = session.disconnect().await {
            tracing::warn!(remote = %self.config.target(), error = %e, "Failed to disconnect SSH session");
        }
    }
}

#[async_trait]
impl Terminal for RemoteTerminal {
    async fn realize(&self, command: &LaunchCommand) -> Result<Arc<dyn ApplicationProcess>> {
        let line = command.to_remote_shell();
        tracing::debug!(remote = %self.config.target(), command = %line, "Realizing remote process");

        let session = Session::connect(self.config.clone()).await?;
        let process = RemoteProcess::start(session, &line, command.orphans_permitted).await?;
        Ok(Arc::new(process))
    }

    async fn make_directories(&self, path: &Path) -> Result<()> {
        let session = Session::connect(self.config.clone()).await?;
        let result = session.make_directories(&path.to_string_lossy()).await;
        self.release(session).await;
        Ok(result?)
    }

    async fn upload(&self, source: &Path, destination: &Path) -> Result<()> {
        let session = Session::connect(self.config.clone()).await?;
        let result = session.upload(source, &destination.to_string_lossy()).await;
        self.release(session).await;
        Ok(result?)
    }
}
