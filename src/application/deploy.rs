// ABOUTME: Deployment of application artifacts to the platform that will run them.
// ABOUTME: The default deployer uploads each artifact through the platform's terminal.

use crate::process::ProcessError;
use crate::terminal::Terminal;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A local file the application needs next to it at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source: PathBuf,
    /// Name of the deployed copy.
    pub file_name: String,
}

impl Artifact {
    /// Deploy `source` under its own file name.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { source, file_name }
    }

    pub fn renamed(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("artifact {0} does not exist")]
    Missing(PathBuf),

    #[error("artifact {path} has no file name")]
    Unnamed { path: PathBuf },

    #[error("failed to transfer {artifact}: {source}")]
    Transfer {
        artifact: String,
        #[source]
        source: ProcessError,
    },
}

/// Moves artifacts into a destination directory on a terminal's host.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, artifacts: &[Artifact], destination: &Path, terminal: &dyn Terminal) -> Result<(), DeployError>;
}

/// Uploads every artifact through [`Terminal::upload`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalDeployer;

#[async_trait]
impl Deployer for TerminalDeployer {
    async fn deploy(&self, artifacts: &[Artifact], destination: &Path, terminal: &dyn Terminal) -> Result<(), DeployError> {
        for artifact in artifacts {
            if artifact.file_name.is_empty() {
                return Err(DeployError::Unnamed {
                    path: artifact.source.clone(),
                });
            }
            if !tokio::fs::try_exists(&artifact.source).await.unwrap_or(false) {
                return Err(DeployError::Missing(artifact.source.clone()));
            }

            let target = destination.join(&artifact.file_name);
            terminal
                .upload(&artifact.source, &target)
                .await
                .map_err(|source| DeployError::Transfer {
                    artifact: artifact.file_name.clone(),
                    source,
                })?;
            tracing::debug!(artifact = %artifact.file_name, destination = %target.display(), "Deployed artifact");
        }
        Ok(())
    }
}

/// Artifacts whose file names are not provided by the platform itself.
pub fn deployable(artifacts: &[Artifact], do_not_deploy: &BTreeSet<String>) -> Vec<Artifact> {
    artifacts
        .iter()
        .filter(|a| !do_not_deploy.contains(&a.file_name))
        .cloned()
        .collect()
}
